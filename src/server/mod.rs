//! Local web UI over `tiny_http`.
//!
//! Requests are handled one at a time on the serving thread, so the single
//! [`Session`] never sees overlapping commands.

mod page;

pub use page::{Outcome, PageView, render_markdown, render_page};

use crate::error::Error;
use crate::session::{RequestExecutor, Session};
use std::io::Read;
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info, warn};

pub const EMPTY_COMMAND_WARNING: &str = "Please enter a command";

/// Upper bound on accepted form bodies.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Response produced by [`App::handle`], independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    fn text(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body,
        }
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found".to_string())
    }
}

#[derive(Debug, thiserror::Error)]
enum BodyError {
    #[error("Request body exceeds {MAX_BODY_BYTES} bytes")]
    TooLarge,

    #[error("Request body is not valid UTF-8")]
    NotUtf8,

    #[error("Failed to read request body: {0}")]
    Io(#[from] std::io::Error),
}

impl BodyError {
    fn reply(&self) -> Reply {
        let status = match self {
            Self::TooLarge => 413,
            Self::NotUtf8 | Self::Io(_) => 400,
        };
        Reply::text(status, self.to_string())
    }
}

/// Fields of the `/run` form.
#[derive(Debug, Default, PartialEq, Eq)]
struct RunForm {
    command: String,
    api_key: String,
}

impl RunForm {
    fn parse(body: &str) -> Self {
        let mut form = Self::default();
        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match key.as_ref() {
                "command" => form.command = value.into_owned(),
                "api_key" => form.api_key = value.into_owned(),
                _ => {}
            }
        }
        form
    }
}

/// The UI's state: one executor and the one session it serves.
pub struct App {
    executor: RequestExecutor,
    session: Session,
}

impl App {
    pub fn new(executor: RequestExecutor) -> Self {
        Self {
            executor,
            session: Session::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle(&mut self, method: &Method, url: &str, body: &str) -> Reply {
        let path = url.split('?').next().unwrap_or(url);
        match (method, path) {
            (Method::Get, "/") => self.page("", None),
            (Method::Post, "/run") => self.run(&RunForm::parse(body)),
            (Method::Get, "/state") => self.state(),
            _ => Reply::not_found(),
        }
    }

    fn run(&mut self, form: &RunForm) -> Reply {
        self.executor.credentials().supply(&form.api_key);

        if form.command.trim().is_empty() {
            let warning = Outcome::Warning(EMPTY_COMMAND_WARNING.to_string());
            return self.page(&form.command, Some(&warning));
        }

        info!(session = %self.session.id(), "Running command");
        let text = self.executor.execute(&mut self.session, &form.command);
        self.page(&form.command, Some(&Outcome::Response(text)))
    }

    fn state(&self) -> Reply {
        let info = self
            .session
            .info(self.executor.credentials().is_present());
        Reply {
            status: 200,
            content_type: "application/json",
            body: serde_json::to_string(&info).unwrap_or_default(),
        }
    }

    fn page(&self, command: &str, outcome: Option<&Outcome>) -> Reply {
        let info = self
            .session
            .info(self.executor.credentials().is_present());
        Reply::html(render_page(&PageView {
            command,
            outcome,
            info: &info,
        }))
    }
}

/// Read a whole form body, refusing anything over [`MAX_BODY_BYTES`].
fn decode_body(reader: impl Read, declared_len: Option<usize>) -> Result<String, BodyError> {
    if declared_len.is_some_and(|len| len as u64 > MAX_BODY_BYTES) {
        return Err(BodyError::TooLarge);
    }
    let mut bytes = Vec::new();
    reader.take(MAX_BODY_BYTES + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_BODY_BYTES {
        return Err(BodyError::TooLarge);
    }
    String::from_utf8(bytes).map_err(|_| BodyError::NotUtf8)
}

fn read_body(request: &mut Request) -> Result<String, BodyError> {
    let declared_len = request.body_length();
    decode_body(request.as_reader(), declared_len)
}

fn content_type(value: &str) -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], value.as_bytes()).ok()
}

/// Serve the UI on `bind` until the listener shuts down.
pub fn serve(bind: &str, mut app: App) -> crate::Result<()> {
    let server =
        Server::http(bind).map_err(|e| Error::Server(format!("Failed to bind {bind}: {e}")))?;
    info!("Listening on http://{bind}");

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();
        debug!(%method, %url, "Request");

        let reply = match read_body(&mut request) {
            Ok(body) => app.handle(&method, &url, &body),
            Err(e) => {
                warn!(%url, "{e}");
                e.reply()
            }
        };
        let mut response = Response::from_string(reply.body).with_status_code(reply.status);
        if let Some(header) = content_type(reply.content_type) {
            response = response.with_header(header);
        }
        if let Err(e) = request.respond(response) {
            warn!(%url, "Failed to send response: {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSpec, LlmKind, RequestParams};
    use crate::credential::CredentialStore;
    use crate::session::SessionLifecycleManager;
    use crate::session::testing::{FakeFactory, Reply as Scripted, Script};
    use std::io::Cursor;
    use std::sync::Arc;

    fn app(script: &Arc<Script>) -> App {
        let lifecycle = SessionLifecycleManager::new(
            Arc::new(FakeFactory::new(script.clone())),
            AgentSpec::browser(),
            LlmKind::OpenAi,
        );
        let credentials = Arc::new(CredentialStore::empty("OPENAI_API_KEY"));
        App::new(RequestExecutor::new(
            lifecycle,
            credentials,
            RequestParams::default(),
        ))
    }

    #[test]
    fn test_form_parsing() {
        let form = RunForm::parse("command=go+to+example.com%2Fdocs&api_key=sk-1&extra=x");
        assert_eq!(form.command, "go to example.com/docs");
        assert_eq!(form.api_key, "sk-1");
        assert_eq!(RunForm::parse(""), RunForm::default());
    }

    #[test]
    fn test_body_within_limit_is_decoded() {
        let body = decode_body(Cursor::new("command=scroll+down"), Some(19)).unwrap();
        assert_eq!(body, "command=scroll+down");

        let full = "a".repeat(MAX_BODY_BYTES as usize);
        assert_eq!(decode_body(Cursor::new(full.clone()), None).unwrap(), full);
    }

    #[test]
    fn test_oversized_body_is_413() {
        let big = format!("command={}", "a".repeat(MAX_BODY_BYTES as usize));
        let err = decode_body(Cursor::new(big), None).unwrap_err();
        assert!(matches!(err, BodyError::TooLarge));
        assert_eq!(err.reply().status, 413);

        let declared = decode_body(Cursor::new(""), Some(1 << 20)).unwrap_err();
        assert!(matches!(declared, BodyError::TooLarge));
    }

    #[test]
    fn test_non_utf8_body_is_400() {
        let err = decode_body(Cursor::new(vec![b'c', 0xff, 0xfe]), None).unwrap_err();
        assert!(matches!(err, BodyError::NotUtf8));
        let reply = err.reply();
        assert_eq!(reply.status, 400);
        assert!(reply.body.contains("UTF-8"));
    }

    #[test]
    fn test_index_page() {
        let mut app = app(&Script::new());
        let reply = app.handle(&Method::Get, "/", "");
        assert_eq!(reply.status, 200);
        assert!(reply.body.contains("Browser MCP Agent"));
    }

    #[test]
    fn test_unknown_route_is_404() {
        let mut app = app(&Script::new());
        assert_eq!(app.handle(&Method::Get, "/favicon.ico", "").status, 404);
        assert_eq!(app.handle(&Method::Get, "/run", "").status, 404);
    }

    #[test]
    fn test_empty_command_skips_executor() {
        let script = Script::new();
        let mut app = app(&script);

        let reply = app.handle(&Method::Post, "/run", "command=+++&api_key=sk-test");

        assert!(reply.body.contains(EMPTY_COMMAND_WARNING));
        assert_eq!(script.constructed(), 0);
        assert!(script.calls().is_empty());
        assert_eq!(app.session().context().created(), 0);
    }

    #[test]
    fn test_run_without_key_shows_missing_credential() {
        let script = Script::new();
        let mut app = app(&script);

        let reply = app.handle(&Method::Post, "/run", "command=go+to+example.com&api_key=");

        assert!(reply.body.contains("No OpenAI API key provided"));
        assert_eq!(script.constructed(), 0);
    }

    #[test]
    fn test_run_renders_response_and_state() {
        let script = Script::new();
        script.push_reply(Scripted::Text("**Navigated.**".into()));
        let mut app = app(&script);

        let reply = app.handle(&Method::Post, "/run", "command=go+to+example.com&api_key=sk-test");

        assert!(reply.body.contains("<strong>Navigated.</strong>"));
        assert!(reply.body.contains("Session State Info"));
        assert_eq!(script.calls()[0].0, "go to example.com");
        assert!(app.session().is_initialized());

        let state = app.handle(&Method::Get, "/state?refresh=1", "");
        assert_eq!(state.content_type, "application/json");
        let json: serde_json::Value = serde_json::from_str(&state.body).unwrap();
        assert_eq!(json["initialized"], true);
        assert_eq!(json["openai_key_set"], true);
        assert_eq!(json["agent_status"], "Ready");
    }

    #[test]
    fn test_blank_key_keeps_previous_key() {
        let script = Script::new();
        script.push_reply(Scripted::Text("one".into()));
        script.push_reply(Scripted::Text("two".into()));
        let mut app = app(&script);

        app.handle(&Method::Post, "/run", "command=first&api_key=sk-test");
        let reply = app.handle(&Method::Post, "/run", "command=second&api_key=");

        assert!(reply.body.contains("<p>two</p>"));
    }
}
