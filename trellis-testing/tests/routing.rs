use axum::http::{Method, StatusCode, header};
use serde::Serialize;
use serde_json::{Value, json};

use trellis::{
    Application, BuildError, FrameworkConfig, ModelView, controller, module, routes,
};
use trellis_testing::TestClient;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub open: u32,
    pub closed: u32,
}

#[controller(path = "/tickets")]
pub struct TicketController;

#[routes]
impl TicketController {
    #[url("/")]
    fn list(&self) -> ModelView {
        ModelView::new("tickets.jsp").with("tickets", vec!["T-1", "T-2"])
    }

    #[url("/edit")]
    #[get]
    fn edit(&self, #[request_param("id")] id: u32) -> ModelView {
        ModelView::new("ticket-edit.jsp").with("id", id)
    }

    #[url("/edit")]
    #[post]
    fn save(&self, #[request_param("id")] id: u32, #[request_param("title")] title: String) -> String {
        format!("saved {id}: {title}")
    }

    #[get("/stats")]
    #[rest]
    fn stats(&self) -> Stats {
        Stats { open: 3, closed: 7 }
    }

    #[get("/summary")]
    #[rest]
    fn summary(&self) -> ModelView {
        ModelView::new("ignored.jsp").with("total", 10)
    }

    #[get("/closed")]
    fn closed(&self, #[request_param("since")] since: Option<chrono::NaiveDate>) -> String {
        match since {
            Some(date) => format!("closed since {date}"),
            None => "closed ever".to_string(),
        }
    }

    #[get("/fail")]
    fn fail(&self) -> anyhow::Result<ModelView> {
        Err(anyhow::anyhow!("database is down"))
    }

    fn helper(&self) -> u32 {
        42
    }
}

#[controller]
pub struct HomeController;

#[routes]
impl HomeController {
    #[url("/")]
    #[get]
    fn home(&self) -> &'static str {
        "home"
    }
}

#[module(controllers = [TicketController])]
pub struct TicketModule;

#[module(imports = [TicketModule], controllers = [HomeController])]
pub struct AppModule;

fn client() -> TestClient {
    let app = Application::builder()
        .config(FrameworkConfig::new(module_path!(), "/desk").unwrap())
        .module::<AppModule>()
        .build()
        .unwrap();
    TestClient::new(app)
}

#[test]
fn test_route_table_is_built_from_modules() {
    let app = Application::builder()
        .config(FrameworkConfig::new(module_path!(), "/desk").unwrap())
        .module::<AppModule>()
        .build()
        .unwrap();

    assert_eq!(
        app.routes().urls(),
        vec![
            "/",
            "/tickets",
            "/tickets/closed",
            "/tickets/edit",
            "/tickets/fail",
            "/tickets/stats",
            "/tickets/summary",
        ]
    );
    assert_eq!(TicketController.helper(), 42);
}

#[test]
fn test_foreign_namespace_has_no_controllers() {
    let result = Application::builder()
        .config(FrameworkConfig::new("billing", "/desk").unwrap())
        .module::<AppModule>()
        .build();

    assert!(matches!(result, Err(BuildError::NoControllers { .. })));
}

#[tokio::test]
async fn test_base_path_maps_to_root() {
    let client = client();

    let response = client.get("/desk").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), "home");

    let response = client.get("/desk/tickets").send().await;
    assert_eq!(response.view(), Some("tickets.jsp"));
}

#[tokio::test]
async fn test_get_and_post_share_a_url() {
    let client = client();

    let response = client.get("/desk/tickets/edit?id=7").send().await;
    assert_eq!(response.view(), Some("ticket-edit.jsp"));
    assert_eq!(response.json::<Value>().unwrap()["id"], 7);

    let response = client
        .post("/desk/tickets/edit")
        .param("id", "7")
        .param("title", "Printer on fire")
        .send()
        .await;
    assert_eq!(response.text(), "saved 7: Printer on fire");
}

#[tokio::test]
async fn test_unknown_url_and_verb() {
    let client = client();

    let response = client.get("/desk/nowhere").send().await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get("/elsewhere/tickets").send().await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.request(Method::DELETE, "/desk/tickets/edit").send().await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.header(header::ALLOW.as_str()), Some("GET, POST"));

    // A method without verb markers answers GET only.
    let response = client.post("/desk/tickets").send().await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_rest_results_are_json() {
    let client = client();

    let response = client.get("/desk/tickets/stats").send().await;
    assert_eq!(response.view(), None);
    assert_eq!(
        response.json::<Value>().unwrap(),
        json!({ "open": 3, "closed": 7 })
    );

    let response = client.get("/desk/tickets/summary").send().await;
    assert_eq!(response.view(), None);
    assert_eq!(response.json::<Value>().unwrap(), json!({ "total": 10 }));
}

#[tokio::test]
async fn test_optional_date_param() {
    let client = client();

    let response = client.get("/desk/tickets/closed?since=2024-02-29").send().await;
    assert_eq!(response.text(), "closed since 2024-02-29");

    let response = client.get("/desk/tickets/closed").send().await;
    assert_eq!(response.text(), "closed ever");

    let response = client.get("/desk/tickets/closed?since=yesterday").send().await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_handler_error_is_internal() {
    let client = client();

    let response = client.get("/desk/tickets/fail").send().await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().unwrap();
    assert_eq!(body["message"], "Internal Server Error");
}
