use wicket::config::Config;
use wicket::http::request::{Method, Request};
use wicket::http::response::StatusCode;
use wicket::http::writer::ResponseWriter;
use wicket::server::{Handler, Router, listener};

struct HelloWorldHandler {
    greeting: String,
}

impl HelloWorldHandler {
    fn new() -> Self {
        Self {
            greeting: "hello there".to_string(),
        }
    }
}

impl Handler for HelloWorldHandler {
    fn serve(&self, w: &mut ResponseWriter, req: &Request) -> anyhow::Result<()> {
        if req.method != Method::GET {
            w.header().set("Content-Length", "0");
            w.write_header(StatusCode::MethodNotAllowed.as_u16())?;
            return Ok(());
        }
        w.header().set("Content-Length", self.greeting.len().to_string());
        w.write(self.greeting.as_bytes())?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let mut router = Router::new();
    router.handle("/", HelloWorldHandler::new())?;
    router.handle_fn("/hi", |w, _req| {
        let response = "hi!";
        w.header().set("Content-Length", response.len().to_string());
        w.write(response.as_bytes())?;
        Ok(())
    })?;

    tokio::select! {
        res = listener::run(&cfg, router) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
