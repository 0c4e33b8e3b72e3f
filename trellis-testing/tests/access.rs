use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

use serde::Serialize;

use trellis::{Application, FrameworkConfig, Model, ModelView, Session, controller, routes};
use trellis_testing::TestClient;

#[controller(path = "/admin", roles = ["admin"])]
pub struct AdminController;

#[routes]
impl AdminController {
    #[get("/dashboard")]
    fn dashboard(&self) -> ModelView {
        ModelView::new("dashboard.jsp")
    }

    #[get("/secrets")]
    fn secrets(&self) -> ModelView {
        ModelView::new("secrets.jsp").with("api_key", "TOP-SECRET")
    }
}

#[derive(Debug, Default, Serialize, Model)]
#[valid]
pub struct Comment {
    #[size(min = 3)]
    pub body: String,
}

#[controller(path = "/comments")]
pub struct CommentController;

#[routes]
impl CommentController {
    #[post("/")]
    fn create(&self, #[model_attribute("comment")] comment: Comment) -> String {
        format!("posted {}", comment.body)
    }
}

#[controller(path = "/account")]
pub struct AccountController {
    session: Session,
}

#[routes]
impl AccountController {
    #[get("/profile")]
    #[auth]
    fn profile(&self, session: Session) -> ModelView {
        let role = session.role().map(|role| role.to_string());
        ModelView::new("profile.jsp").with("role", role)
    }

    #[get("/billing")]
    #[auth(roles = ["owner", "admin"])]
    fn billing(&self) -> &'static str {
        "billing"
    }

    #[get("/public")]
    fn public(&self) -> &'static str {
        "public"
    }

    #[post("/login")]
    fn login(&self, #[request_param("role")] role: Option<String>) -> &'static str {
        self.session.authenticate(role.as_deref());
        "welcome"
    }

    #[post("/logout")]
    fn logout(&self) -> &'static str {
        self.session.logout();
        "bye"
    }
}

fn app() -> Application {
    let config = FrameworkConfig::new(module_path!(), "/")
        .unwrap()
        .with_unauthenticated_view("login.jsp");
    Application::builder()
        .config(config)
        .controller::<AdminController>()
        .controller::<AccountController>()
        .controller::<CommentController>()
        .build()
        .unwrap()
}

fn client() -> TestClient {
    TestClient::new(app())
}

async fn assert_denied(client: &TestClient, uri: &str) {
    let response = client.get(uri).send().await;
    assert_eq!(response.status(), StatusCode::OK, "{uri}");
    assert_eq!(response.view(), Some("login.jsp"), "{uri}");
    let data: Value = response.json().unwrap();
    assert_eq!(data["message"], "User not authenticated");
}

#[tokio::test]
async fn test_anonymous_session_is_sent_to_login() {
    let client = client();

    assert_denied(&client, "/account/profile").await;
    assert_denied(&client, "/account/billing").await;
    assert_denied(&client, "/admin/dashboard").await;

    let response = client.get("/account/public").send().await;
    assert_eq!(response.text(), "public");
}

#[tokio::test]
async fn test_authenticated_without_role() {
    let client = client();
    client.post("/account/login").send().await;

    let response = client.get("/account/profile").send().await;
    assert_eq!(response.view(), Some("profile.jsp"));
    assert_eq!(response.json::<Value>().unwrap()["role"], Value::Null);

    assert_denied(&client, "/account/billing").await;
    assert_denied(&client, "/admin/dashboard").await;
}

#[tokio::test]
async fn test_roles_grant_access() {
    let owner = client();
    owner.post("/account/login").param("role", "owner").send().await;
    assert_eq!(owner.get("/account/billing").send().await.text(), "billing");
    assert_denied(&owner, "/admin/dashboard").await;

    let admin = client();
    admin.session().authenticate(Some("admin"));
    assert_eq!(admin.get("/account/billing").send().await.text(), "billing");
    let response = admin.get("/admin/dashboard").send().await;
    assert_eq!(response.view(), Some("dashboard.jsp"));

    let profile: Value = admin.get("/account/profile").send().await.json().unwrap();
    assert_eq!(profile["role"], "admin");
}

#[tokio::test]
async fn test_logout_revokes_access() {
    let client = client();
    client.session().authenticate(Some("admin"));
    assert_eq!(client.get("/admin/dashboard").send().await.view(), Some("dashboard.jsp"));

    client.post("/account/logout").send().await;
    assert_denied(&client, "/admin/dashboard").await;
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = Arc::new(app());
    let admin = TestClient::shared(Arc::clone(&app));
    let visitor = TestClient::shared(app);
    admin.session().authenticate(Some("admin"));

    assert_eq!(admin.get("/admin/dashboard").send().await.view(), Some("dashboard.jsp"));
    assert_denied(&visitor, "/admin/dashboard").await;
}

#[tokio::test]
async fn test_denied_page_is_not_reused_as_form() {
    let client = client();
    assert_denied(&client, "/admin/secrets").await;

    let response = client.post("/comments").param("body", "x").send().await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_ne!(response.view(), Some("secrets.jsp"));
    assert!(!response.text().contains("TOP-SECRET"));
}

#[tokio::test]
async fn test_stored_form_rechecked_after_logout() {
    let client = client();
    client.session().authenticate(Some("admin"));
    assert_eq!(client.get("/admin/secrets").send().await.view(), Some("secrets.jsp"));

    let response = client.post("/comments").param("body", "x").send().await;
    assert_eq!(response.view(), Some("secrets.jsp"));

    client.post("/account/logout").send().await;
    let response = client.post("/comments").param("body", "x").send().await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.text().contains("TOP-SECRET"));
    let body: Value = response.json().unwrap();
    assert!(body["errors"]["body"].is_array());
}
