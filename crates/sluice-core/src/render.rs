use crate::model::Bundle;

/// Turns a bundle into executable script text. Rendering is a pure
/// function of the bundle: the engine resolves commands and workspaces
/// before calling it, so renderers never touch the store or the
/// filesystem.
pub trait ScriptRenderer {
    fn render(&self, bundle: &Bundle) -> String;
}
