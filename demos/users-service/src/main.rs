//! Users demo service.
//!
//! `GET /users` lists users, `GET /users/{id}` fetches one, `POST /users`
//! creates one from `{"name": "...", "email": "..."}` and
//! `DELETE /users/{id}` removes one. Everything else is a 404 problem.
//!
//! ```text
//! XHTTP__SERVER__HTTP_ADDR=127.0.0.1:8080 XHTTP__LOGGING__FORMAT=pretty \
//!     cargo run -p demo-users-service
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use http::{header::CONTENT_TYPE, Method};
use serde::{Deserialize, Serialize};
use xhttp::prelude::*;

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct CreateUser {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    One(User),
    Many(Vec<User>),
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    users: BTreeMap<u64, User>,
}

type Shared = Arc<RwLock<Store>>;

async fn users(store: Shared, req: Request) -> Result<Option<Reply>, HandlerError> {
    let path = req.uri().path().trim_end_matches('/');
    let id = path.strip_prefix("/users/");

    match (req.method(), path, id) {
        (&Method::GET, "/users", _) => {
            let store = read(&store)?;
            Ok(Some(Reply::Many(store.users.values().cloned().collect())))
        }
        (&Method::POST, "/users", _) => create(&store, &req).map(|user| Some(Reply::One(user))),
        (&Method::GET, _, Some(id)) => {
            let id = parse_id(id)?;
            let store = read(&store)?;
            store
                .users
                .get(&id)
                .cloned()
                .map(|user| Some(Reply::One(user)))
                .ok_or_else(|| Problem::not_found(format!("user {id} not found")).into())
        }
        (&Method::DELETE, _, Some(id)) => {
            let id = parse_id(id)?;
            let mut store = store
                .write()
                .map_err(|_| Problem::service_unavailable(StoreUnavailable))?;
            match store.users.remove(&id) {
                Some(_) => Ok(None),
                None => Err(Problem::not_found(format!("user {id} not found")).into()),
            }
        }
        _ => Err(Problem::not_found(format!("no route for {} {path}", req.method())).into()),
    }
}

fn create(store: &Shared, req: &Request) -> Result<User, HandlerError> {
    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if !is_json {
        return Err(Problem::unsupported_media_type().into());
    }

    let input: CreateUser = serde_json::from_slice(req.body())
        .map_err(|e| Problem::bad_request([InvalidParam::new("body", e.to_string())]))?;

    let mut invalid = Vec::new();
    if input.name.trim().is_empty() {
        invalid.push(InvalidParam::new("name", "must not be empty"));
    }
    if !input.email.contains('@') {
        invalid.push(InvalidParam::new("email", "must be an email address"));
    }
    if !invalid.is_empty() {
        return Err(Problem::bad_request(invalid).into());
    }

    let mut store = store
        .write()
        .map_err(|_| Problem::service_unavailable(StoreUnavailable))?;
    store.next_id += 1;
    let user = User {
        id: store.next_id,
        name: input.name,
        email: input.email,
    };
    store.users.insert(user.id, user.clone());
    tracing::info!(user_id = user.id, "user created");
    Ok(user)
}

fn read(store: &Shared) -> Result<std::sync::RwLockReadGuard<'_, Store>, Problem> {
    store
        .read()
        .map_err(|_| Problem::service_unavailable(StoreUnavailable))
}

fn parse_id(raw: &str) -> Result<u64, Problem> {
    raw.parse()
        .map_err(|_| Problem::bad_request([InvalidParam::new("id", "must be a positive integer")]))
}

#[derive(Debug, thiserror::Error)]
#[error("user store lock poisoned")]
struct StoreUnavailable;

#[tokio::main]
async fn main() -> Result<(), xhttp::Error> {
    let config = ConfigLoader::new()
        .with_dotenv()?
        .with_optional_file("users-service.toml")?
        .with_env_prefix("XHTTP")
        .load()?;

    let store = Shared::default();
    let handler = HttpHandler::new(move |_ctx: RequestContext, req: Request| {
        let store = Arc::clone(&store);
        async move { users(store, req).await }
    });

    xhttp::serve(&config, handler).await
}
