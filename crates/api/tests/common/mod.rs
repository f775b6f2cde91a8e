//! Test infrastructure for HTTP integration tests
//!
//! Each test starts its own server on an ephemeral port backed by a fresh
//! in-memory database, so no state is shared between tests.

use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Value, json};
use tasktrack_api::{ApiConfig, AppState};
use tasktrack_db::Database;

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "correct horse battery";

/// A running server and a client pointed at it
pub struct TestServer {
    pub state: AppState,
    pub base_url: String,
    pub client: Client,
}

/// A registered account
pub struct Account {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let db = Database::connect_memory().await.unwrap();
        db.init().await.unwrap();
        let state = AppState::new(db, ApiConfig::new(SECRET));

        let listener = tasktrack_api::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(tasktrack_api::serve(
            listener,
            state.clone(),
            std::future::pending(),
        ));

        Self {
            state,
            base_url: format!("http://{}", addr),
            client: Client::new(),
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.unwrap()
    }

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(Method::PATCH, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Response {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    /// Register an account named `name` with email `<name>@example.com`.
    pub async fn register(&self, name: &str) -> Account {
        let email = format!("{}@example.com", name.to_lowercase());
        let response = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "email": email, "name": name, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();

        Account {
            id: body["user"]["id"].as_str().unwrap().to_string(),
            email,
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Create a group workspace owned by `owner` and return its id.
    pub async fn create_workspace(&self, owner: &Account, name: &str) -> String {
        let response = self
            .post("/workspaces", &owner.token, json!({ "name": name }))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(response).await
    }

    /// Add `user` to a workspace with `role`, acting as `actor`.
    pub async fn add_workspace_member(
        &self,
        actor: &Account,
        workspace_id: &str,
        user: &Account,
        role: &str,
    ) {
        let response = self
            .post(
                &format!("/workspaces/{}/members", workspace_id),
                &actor.token,
                json!({ "email": user.email, "role": role }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    /// Create a project in a workspace and return its id.
    pub async fn create_project(&self, creator: &Account, workspace_id: &str, name: &str) -> String {
        let response = self
            .post(
                &format!("/workspaces/{}/projects", workspace_id),
                &creator.token,
                json!({ "name": name }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(response).await
    }

    /// Id of the project role called `name`.
    pub async fn role_id(&self, actor: &Account, project_id: &str, name: &str) -> String {
        let roles: Value = self
            .get(&format!("/projects/{}/roles", project_id), &actor.token)
            .await
            .json()
            .await
            .unwrap();
        roles
            .as_array()
            .unwrap()
            .iter()
            .find(|role| role["name"] == name)
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Add `user` to a project with the named role, acting as `actor`.
    pub async fn add_project_member(
        &self,
        actor: &Account,
        project_id: &str,
        user: &Account,
        role: Option<&str>,
    ) {
        let role_id = match role {
            Some(name) => Some(self.role_id(actor, project_id, name).await),
            None => None,
        };
        let response = self
            .post(
                &format!("/projects/{}/members", project_id),
                &actor.token,
                json!({ "user_id": user.id, "role_id": role_id }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    /// Create a task and return its id.
    pub async fn create_task(&self, actor: &Account, project_id: &str, body: Value) -> String {
        let response = self
            .post(&format!("/projects/{}/tasks", project_id), &actor.token, body)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        id_of(response).await
    }
}

/// The `id` field of a JSON response body.
pub async fn id_of(response: Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

/// Assert an error response's status and machine-readable fields.
pub async fn assert_error(response: Response, status: StatusCode, code: &str, reason: Option<&str>) {
    assert_eq!(response.status(), status);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], code, "unexpected body: {}", body);
    if let Some(reason) = reason {
        assert_eq!(body["reason"], reason, "unexpected body: {}", body);
    }
}
