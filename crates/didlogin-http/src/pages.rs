//! HTML views.
use crate::qrcode::str_to_qr_code_data_uri;
use didlogin_core::message::Message;
use log::warn;

const LAYOUT: &str = include_str!("../static/layout.html");

/// Escapes text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn render(title: &str, views: u64, body: &str) -> String {
    LAYOUT
        .replace("{{title}}", &escape(title))
        .replace("{{views}}", &views.to_string())
        .replace("{{body}}", body)
}

/// A link, preceded by its QR code when the URL fits in one.
fn link_with_qr_code(url: &str, label: &str) -> String {
    let qr_code = match str_to_qr_code_data_uri(url) {
        Ok(data_uri) => format!(r#"<p><img class="qr" src="{data_uri}" alt="QR code"></p>"#),
        Err(err) => {
            warn!("Rendering link without QR code: {}", err);
            String::new()
        }
    };
    format!(
        r#"{qr_code}<p><a href="{}">{}</a></p>"#,
        escape(url),
        escape(label)
    )
}

pub fn home(did: &str, name: &str, views: u64) -> String {
    let body = format!(
        "<p>Welcome, {}!</p><p>You are logged in as <code>{}</code>.</p>",
        escape(name),
        escape(did)
    );
    render("Home", views, &body)
}

pub fn history(did: &str, name: &str, views: u64, messages: &[Message]) -> String {
    let rows: String = messages
        .iter()
        .map(|message| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                escape(&message.created_at.to_rfc3339()),
                escape(message.type_.as_str()),
                escape(message.thread_id().unwrap_or("")),
                escape(&message.id)
            )
        })
        .collect();
    let body = format!(
        "<p>Messages sent by {} (<code>{}</code>)</p>\
        <table><tr><th>Date</th><th>Type</th><th>Thread</th><th>Id</th></tr>{rows}</table>",
        escape(name),
        escape(did)
    );
    render("History", views, &body)
}

pub fn login(url: &str, views: u64) -> String {
    let body = format!(
        "<p>Scan the QR code with your wallet to share your name and log in.</p>{}\
        <script>\
        const events = new EventSource('/events');\
        events.addEventListener('loggedin', () => {{ window.location.href = '/home'; }});\
        </script>",
        link_with_qr_code(url, "Open in wallet")
    );
    render("Login", views, &body)
}

pub fn credential(url: &str, views: u64) -> String {
    let body = format!(
        "<p>Scan the QR code to receive your credentials.</p>{}",
        link_with_qr_code(url, "Open in wallet")
    );
    render("Credential", views, &body)
}

pub fn about(url: &str, views: u64) -> String {
    let body = format!(
        "<p>Scan the QR code to view the public profile of this service.</p>{}",
        link_with_qr_code(url, url)
    );
    render("About", views, &body)
}
