//! Rendering capability.
//!
//! Templates are out of scope here: `render` resolves the view and layout
//! paths and records a [`RenderCall`] on the response for whichever backend
//! serves it.

use crate::{class::Layout, context::RenderCall, scope::Scope};

/// Record a render call on the response.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot render views",
    label = "missing `Renderer` implementation",
    note = "Step bodies render through their `Scope`."
)]
pub trait Renderer {
    /// Render `view`, or `"{controller}/{action}"` when `None`, in the class layout.
    fn render(&mut self, view: Option<&str>) {
        self.render_with(view, Layout::Default);
    }

    /// Render with an explicit layout. [`Layout::Default`] means the class layout.
    fn render_with(&mut self, view: Option<&str>, layout: Layout);
}

impl Renderer for Scope<'_> {
    fn render_with(&mut self, view: Option<&str>, layout: Layout) {
        let class = self.class();
        let view = view.map_or_else(
            || format!("{}/{}", self.controller_name(), self.action_name()),
            str::to_owned,
        );
        let layout = match layout {
            Layout::Default => class.layout_path(class.layout()),
            other => class.layout_path(&other),
        };

        tracing::trace!(controller = %self.controller_name(), view = %view, "render");
        let call = RenderCall {
            view,
            layout,
            locals: self.locals().clone(),
        };
        self.response().rendered = Some(call);
    }
}
