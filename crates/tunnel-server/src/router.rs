//! Request path classification.

use std::borrow::Cow;

/// Where a request path sends the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/server/<code>/...`: register `code` and serve it.
    Server { code: String },
    /// `/client/<code>/<rest>`: attach to `code`; `path` is `/<rest>`.
    Client { code: String, path: String },
}

/// Classify a request target. Returns `None` for targets that should be
/// answered with 400.
///
/// Origin-form (`/a/b?q`) and absolute-form (`http://host/a/b`) targets are
/// accepted. The query is ignored and the path is percent-decoded before it
/// is split into at most four pieces on `/`, so `<rest>` keeps any further
/// slashes.
pub fn route_path(target: &str) -> Option<Route> {
    let path = decoded_path(target)?;

    let mut parts = path.splitn(4, '/');
    let _leading = parts.next()?;
    let role = parts.next()?;
    let code = parts.next()?;
    let rest = parts.next()?;

    match role {
        "server" => Some(Route::Server {
            code: code.to_string(),
        }),
        "client" => Some(Route::Client {
            code: code.to_string(),
            path: format!("/{rest}"),
        }),
        _ => None,
    }
}

fn decoded_path(target: &str) -> Option<Cow<'_, str>> {
    let target = target.split_once('?').map_or(target, |(path, _)| path);
    let path = match target.split_once("://") {
        // Absolute-form: drop scheme and authority.
        Some((_, rest)) if !target.starts_with('/') => {
            rest.find('/').map_or("/", |idx| &rest[idx..])
        }
        _ => target,
    };
    urlencoding::decode(path).ok()
}
