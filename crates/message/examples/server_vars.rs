use std::env;

use micro_message::protocol::{
    HttpError, HttpMessage, ParsedBody, RequestContext, RequestMessage, Response, ServerRequest,
};
use serde_json::json;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // run as a CGI program, or fall back to a canned request
    let context = if env::var_os("REQUEST_METHOD").is_some() {
        RequestContext::from_server_vars(env::vars())
    } else {
        RequestContext::from_server_vars([
            ("REQUEST_METHOD", "POST"),
            ("REQUEST_URI", "http://localhost:8080/profile?tab=avatar"),
            ("SERVER_PROTOCOL", "HTTP/1.1"),
            ("QUERY_STRING", "tab=avatar"),
            ("CONTENT_TYPE", "application/json"),
            ("HTTP_ACCEPT", "application/json, text/plain"),
            ("HTTP_COOKIE", "session=9f2c; theme=dark"),
            ("PHP_AUTH_USER", "micro"),
            ("PHP_AUTH_PW", "secret"),
        ])
        .with_body(r#"{"nickname": "micro"}"#)
        .with_files(json!({
            "avatar": {"name": "me.png", "type": "image/png", "tmp_name": "/tmp/php7Y3a", "error": 0, "size": 2048}
        }))
    };

    match handle(context) {
        Ok(response) => info!(status = response.status().as_u16(), body_len = response.body().len(), "response ready"),
        Err(e) => error!(cause = %e, "failed to handle request"),
    }
}

fn handle(context: RequestContext) -> Result<http::Response<bytes::Bytes>, HttpError> {
    let request = ServerRequest::from_context(context)?;

    info!(
        method = request.method(),
        target = %request.request_target(),
        protocol = request.protocol_version(),
        "receiving request"
    );
    for (name, values) in request.headers() {
        info!(name = %name, value = %values.join(","), "header");
    }
    for (name, value) in request.cookie_params() {
        info!(name = %name, value = %value, "cookie");
    }
    for file in request.uploaded_files().leaves() {
        info!(
            filename = file.client_filename().unwrap_or_default(),
            media_type = file.client_media_type().unwrap_or_default(),
            size = file.size().unwrap_or_default(),
            "uploaded file"
        );
    }

    let nickname = match request.parsed_body()? {
        Some(ParsedBody::Json(body)) => body["nickname"].as_str().unwrap_or("stranger").to_owned(),
        _ => "stranger".to_owned(),
    };

    let body = format!("hello {nickname}\r\n");
    let response = Response::new()
        .with_status(200, "")?
        .with_header("Content-Type", "text/plain")?
        .with_header("Content-Length", body.len().to_string())?
        .with_body(body);

    response.to_http()
}
