//! HTML for the single-page UI.

use crate::session::SessionInfo;
use pulldown_cmark::{Event, Options, Parser, html};

const EXAMPLES: &[(&str, &[&str])] = &[
    ("Navigation", &["Go to wikipedia.org/wiki/computer_vision"]),
    (
        "Interaction",
        &[
            "Click on the link to object detection and take a screenshot",
            "Scroll down and summarize the page",
        ],
    ),
    (
        "Multi-step Tasks",
        &[
            "Navigate to wikipedia.org/wiki/computer_vision, scroll down and report details",
            "Scroll down and summarize the wikipedia page",
        ],
    ),
];

const STYLE: &str = r"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; }
aside { width: 320px; padding: 24px; background: #f0f2f6; min-height: 100vh; box-sizing: border-box; }
main { flex: 1; padding: 24px 48px; }
h1 { text-align: center; }
textarea { width: 100%; height: 100px; box-sizing: border-box; font: inherit; }
input[type=password] { width: 100%; box-sizing: border-box; }
button { width: 100%; padding: 10px; margin-top: 8px; background: #ff4b4b; color: #fff; border: 0; border-radius: 6px; font: inherit; }
.warning { background: #fffce7; border-left: 4px solid #f0c000; padding: 8px 12px; }
.caption { color: #808495; font-size: 0.85em; }
pre.state { background: #f6f8fa; padding: 12px; }
";

/// What the page shows below the command form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Input was rejected before reaching the agent.
    Warning(String),
    /// Markdown text returned by the executor.
    Response(String),
}

pub struct PageView<'a> {
    pub command: &'a str,
    pub outcome: Option<&'a Outcome>,
    pub info: &'a SessionInfo,
}

/// Render markdown to HTML. Raw HTML in the input is shown as text.
#[must_use]
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn sidebar(info: &SessionInfo) -> String {
    let mut out = String::from("<aside>\n<h3>Configuration</h3>\n");
    out.push_str(
        "<label for=\"api_key\">OpenAI API Key</label>\n\
         <input type=\"password\" id=\"api_key\" name=\"api_key\" form=\"run\" autocomplete=\"off\"",
    );
    if info.credential_present {
        out.push_str(" placeholder=\"Key set\"");
    }
    out.push_str(">\n<h3>Example commands</h3>\n");
    for (heading, commands) in EXAMPLES {
        out.push_str(&format!("<p><strong>{heading}</strong></p>\n<ul>\n"));
        for command in *commands {
            out.push_str(&format!("<li>{}</li>\n", html_escape(command)));
        }
        out.push_str("</ul>\n");
    }
    out.push_str(
        "<p class=\"caption\">The agent uses puppeteer to control the browser</p>\n</aside>\n",
    );
    out
}

#[must_use]
pub fn render_page(view: &PageView<'_>) -> String {
    let mut body = String::new();
    body.push_str("<h1>Browser MCP Agent</h1>\n");
    body.push_str(
        "<p>Interact with a powerful web browsing agent that can navigate and interact with websites</p>\n",
    );
    body.push_str(&format!(
        "<form id=\"run\" method=\"post\" action=\"/run\">\n\
         <label for=\"command\">Your command</label>\n\
         <textarea id=\"command\" name=\"command\" \
         placeholder=\"Ask the agent to navigate to websites and interact with them\">{}</textarea>\n\
         <button type=\"submit\">Run command</button>\n</form>\n",
        html_escape(view.command)
    ));

    match view.outcome {
        Some(Outcome::Warning(text)) => {
            body.push_str(&format!(
                "<p class=\"warning\">{}</p>\n",
                html_escape(text)
            ));
        }
        Some(Outcome::Response(markdown)) => {
            body.push_str("<h3>Response</h3>\n");
            body.push_str(&render_markdown(markdown));
            let state = serde_json::to_string_pretty(view.info).unwrap_or_default();
            body.push_str(&format!(
                "<details>\n<summary>Session State Info</summary>\n<pre class=\"state\">{}</pre>\n</details>\n",
                html_escape(&state)
            ));
        }
        None => {}
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Browser MCP Agent</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{}<main>\n{body}</main>\n</body>\n</html>\n",
        sidebar(view.info)
    )
}
