//! Route grouping.

use crate::app::App;

/// A group of related routes, registered together via
/// [`App::mount`](crate::App::mount).
///
/// ```rust,no_run
/// use weft::{App, Controller, Params, Reply};
///
/// struct Users;
///
/// impl Controller for Users {
///     fn register(&self, app: App) -> App {
///         app.get("/users/{id}", get_user)
///             .post("/users", create_user)
///     }
/// }
///
/// async fn get_user(_query: Params, path: Params) -> anyhow::Result<Reply> {
///     Ok(Reply::ok(serde_json::json!({ "id": path.get_i64("id")? })))
/// }
///
/// async fn create_user(query: Params, _path: Params) -> anyhow::Result<Reply> {
///     Ok(Reply::ok(serde_json::json!({ "name": query.get("name") })))
/// }
///
/// let app = App::new().mount(Users);
/// ```
pub trait Controller {
    fn register(&self, app: App) -> App;
}
