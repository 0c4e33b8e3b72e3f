use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};

use trellis::session::keys;
use trellis::{Application, FrameworkConfig, ModelView, Session, controller, module, routes};
use trellis_testing::TestClient;

static FORM_RENDERS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Default, Serialize, trellis::Model)]
#[valid]
pub struct Signup {
    #[size(min = 3, max = 12)]
    pub username: String,
    #[not_null(message = "Email is required")]
    pub email: Option<String>,
    #[number(can_be_negative = false)]
    pub age: i32,
}

#[controller]
pub struct SignupController {
    session: Session,
}

#[routes]
impl SignupController {
    #[url("/signup")]
    #[get]
    fn show_form(&self) -> ModelView {
        FORM_RENDERS.fetch_add(1, Ordering::SeqCst);
        ModelView::new("signup.jsp").with("title", "Create account")
    }

    #[url("/signup")]
    #[post]
    fn submit(&self, #[model_attribute("user")] user: Signup) -> ModelView {
        self.session.authenticate(None);
        ModelView::new("welcome.jsp")
            .with("username", user.username)
            .with("age", user.age)
    }

    /// Has no GET form of its own; failures fall back to the exception filter.
    #[post("/api/signup")]
    fn api_submit(&self, #[model_attribute("user")] user: Signup) -> String {
        format!("created {}", user.username)
    }
}

#[module(controllers = [SignupController])]
pub struct FormsModule;

fn client() -> TestClient {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let app = Application::builder()
        .config(FrameworkConfig::new(module_path!(), "/shop").unwrap())
        .module::<FormsModule>()
        .build()
        .unwrap();
    TestClient::new(app)
}

#[tokio::test]
async fn test_valid_submission_reaches_handler() {
    let client = client();

    let response = client
        .post("/shop/signup")
        .param("username", "grace")
        .param("email", "grace@example.com")
        .param("age", "36")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.view(), Some("welcome.jsp"));
    let data: Value = response.json().unwrap();
    assert_eq!(data["username"], "grace");
    assert_eq!(data["age"], 36);
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn test_failed_submission_rerenders_stored_form() {
    let client = client();

    let form = client.get("/shop/signup").send().await;
    assert_eq!(form.view(), Some("signup.jsp"));
    let renders_before = FORM_RENDERS.load(Ordering::SeqCst);

    let response = client
        .post("/shop/signup")
        .param("username", "al")
        .param("age", "-4")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.view(), Some("signup.jsp"));
    assert!(FORM_RENDERS.load(Ordering::SeqCst) > renders_before);

    let data: Value = response.json().unwrap();
    assert_eq!(data["title"], "Create account");
    let errors = &data[keys::VALIDATION_ERRORS];
    assert_eq!(errors["username"], json!(["Size must be between 3 and 12"]));
    assert_eq!(errors["email"], json!(["Email is required"]));
    assert_eq!(errors["age"], json!(["Number must not be negative"]));

    // Submitted values come back under the model attribute name.
    assert_eq!(data["user"]["username"], "al");
    assert_eq!(data["user"]["age"], -4);
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_failure_without_form_redirects_to_referer() {
    let client = client();

    let response = client
        .post("/shop/api/signup")
        .param("username", "x")
        .header("Referer", "/shop/signup")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/shop/signup"));

    let stored = client
        .session()
        .get::<Value>(keys::VALIDATION_ERRORS)
        .unwrap();
    assert!(stored["username"].is_array());
    assert!(stored["email"].is_array());
}

#[tokio::test]
async fn test_ajax_failure_returns_error_payload() {
    let client = client();

    let response = client
        .post("/shop/api/signup")
        .param("username", "x")
        .header("Referer", "/shop/signup")
        .ajax()
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().unwrap();
    assert_eq!(body["message"], "Validation failed for multiple fields");
    assert_eq!(body["errors"]["email"], json!(["Email is required"]));
}

#[tokio::test]
async fn test_unparseable_number_is_a_bad_request() {
    let client = client();

    let response = client
        .post("/shop/signup")
        .param("username", "grace")
        .param("email", "grace@example.com")
        .param("age", "thirty")
        .send()
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().unwrap();
    assert_eq!(body["statusCode"], 400);
}
