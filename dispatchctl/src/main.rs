use anyhow::Result;
use clap::Parser;
use std::fmt::Debug;
use std::process::ExitCode;
use tracing::instrument;

#[derive(Parser, Debug)]
#[clap(
    author = "Alex Markov",
    version = "0.1.0",
    about = "Report an incident to the dispatch gateway"
)]
struct Args {
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    gateway_address: String,
    #[clap(short, long, required_unless_present = "demo")]
    zone: Option<String>,
    #[clap(short, long, required_unless_present = "demo")]
    incident: Option<String>,
    #[clap(short, long, required_unless_present = "demo")]
    message: Option<String>,
    /// Send the fixed demo dispatch instead of a structured report
    #[clap(long, conflicts_with_all = ["zone", "incident", "message"])]
    demo: bool,
}

#[derive(serde::Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HttpResponse {
    status: String,
    response_message: String,
}
impl HttpResponse {
    pub fn to_message(&self) -> String {
        format!("[{}] {}", self.status.to_uppercase(), self.response_message)
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

struct HttpClient {
    client: reqwest::Client,
    url: String,
}
impl Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("url", &self.url)
            .finish()
    }
}

impl HttpClient {
    fn new(address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://{}", address),
        }
    }

    #[instrument(skip_all, fields(url = %self.url, status))]
    async fn send_request(
        &self,
        path: &str,
        json_data: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(format!("{}{}", self.url, path));
        if let Some(json_data) = json_data {
            request = request.json(&json_data);
        }

        let response: HttpResponse = request.send().await?.json().await?;
        tracing::Span::current().record("status", response.status.as_str());
        Ok(response)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let args = Args::parse();
    let client = HttpClient::new(&args.gateway_address);

    let response = if args.demo {
        client.send_request("/dispatch/demo", None).await?
    } else {
        let json_data = serde_json::json!({
            "zoneId": args.zone.unwrap_or_default(),
            "incidentType": args.incident.unwrap_or_default(),
            "message": args.message.unwrap_or_default(),
        });
        client.send_request("/dispatch", Some(json_data)).await?
    };

    println!("{}", response.to_message());

    if response.is_error() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
