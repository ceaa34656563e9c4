mod common;

use std::io::Write;
use std::time::Duration;

use common::TestServer;
use curlwrap::{JsonValue, Session};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, Request, ResponseTemplate};

fn echo_header(name: &'static str) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync {
    move |request: &Request| {
        let value = request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ResponseTemplate::new(200).set_body_string(value)
    }
}

#[test]
fn get_returns_body_and_metadata() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("hello world"),
            )
            .expect(1),
    );

    let mut session = Session::new()?;
    let body = session.get(&server.url("/hello"))?;

    assert_eq!(body, "hello world");
    assert_eq!(session.last_response(), "hello world");
    assert_eq!(session.code()?, 200);
    assert!(session.error().is_empty());

    let info = session.info();
    assert_eq!(info.url.as_deref(), Some(server.url("/hello").as_str()));
    assert_eq!(info.effective_method.as_deref(), Some("GET"));
    assert_eq!(info.content_type.as_deref(), Some("text/plain"));
    assert_eq!(info.size_download, Some(11));
    assert_eq!(info.download_content_length, Some(11));
    assert_eq!(info.redirect_count, Some(0));
    assert_eq!(info.primary_port, Some(server.port()));
    assert!(info.total_time.is_some());
    assert!(info.starttransfer_time.is_some());

    server.verify();
    Ok(())
}

#[test]
fn code_reports_actual_status() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope")),
    );

    let mut session = Session::new()?;
    let body = session.get(&server.url("/missing"))?;

    assert_eq!(body, "nope");
    assert_eq!(session.code()?, 404);
    assert!(session.error().is_empty());
    Ok(())
}

#[test]
fn post_and_put_share_body_encoding() -> anyhow::Result<()> {
    let server = TestServer::start();
    let echo = |request: &Request| {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = String::from_utf8_lossy(&request.body).into_owned();
        ResponseTemplate::new(200).set_body_string(format!("{}|{}", content_type, body))
    };
    server.mount(Mock::given(method("POST")).and(path("/form")).respond_with(echo));
    server.mount(Mock::given(method("PUT")).and(path("/form")).respond_with(echo));

    let mut session = Session::new()?;
    let posted = session.post(&server.url("/form"), [("a", 1)])?;
    assert_eq!(session.info().effective_method.as_deref(), Some("POST"));
    let put = session.put(&server.url("/form"), [("a", 1)])?;
    assert_eq!(session.info().effective_method.as_deref(), Some("PUT"));

    assert_eq!(posted, "application/x-www-form-urlencoded|a=1");
    assert_eq!(posted, put);
    assert_eq!(session.info().size_upload, Some(3));
    Ok(())
}

#[test]
fn post_json_raw_and_multipart() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("POST"))
            .and(path("/json"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"name":"curlwrap"}"#))
            .respond_with(ResponseTemplate::new(201)),
    );
    server.mount(
        Mock::given(method("POST"))
            .and(path("/raw"))
            .and(body_string("just text"))
            .respond_with(ResponseTemplate::new(200)),
    );
    server.mount(
        Mock::given(method("POST"))
            .and(path("/multipart"))
            .respond_with(|request: &Request| {
                let content_type = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let body = String::from_utf8_lossy(&request.body).into_owned();
                let ok = content_type.starts_with("multipart/form-data; boundary=")
                    && body.contains("name=\"field\"")
                    && body.contains("value");
                ResponseTemplate::new(if ok { 200 } else { 400 })
            }),
    );

    let mut session = Session::new()?;

    session.post(&server.url("/json"), serde_json::json!({"name": "curlwrap"}))?;
    assert_eq!(session.code()?, 201);

    session.post(&server.url("/raw"), "just text")?;
    assert_eq!(session.code()?, 200);

    session.post(
        &server.url("/multipart"),
        curlwrap::Params::multipart([("field", "value")]),
    )?;
    assert_eq!(session.code()?, 200);
    // the multipart body is streamed, its size still has to be reported
    let info = session.info();
    assert!(info.size_upload.unwrap_or(0) > 0);
    assert_eq!(info.upload_content_length, info.size_upload);
    Ok(())
}

#[test]
fn delete_and_head() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("DELETE"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1),
    );
    server.mount(
        Mock::given(method("HEAD"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ignored"))
            .expect(1),
    );

    let mut session = Session::new()?;

    let body = session.delete(&server.url("/item"))?;
    assert!(body.is_empty());
    assert_eq!(session.code()?, 204);

    let body = session.head(&server.url("/item"))?;
    assert!(body.is_empty());
    assert_eq!(session.code()?, 200);
    assert_eq!(session.info().effective_method.as_deref(), Some("HEAD"));

    server.verify();
    Ok(())
}

#[test]
fn upload_sends_file_as_put_body() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("PUT"))
            .and(path("/upload"))
            .and(body_string("file contents"))
            .respond_with(ResponseTemplate::new(201).set_body_string("stored"))
            .expect(1),
    );

    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(b"file contents")?;
    file.flush()?;

    let mut session = Session::new()?;
    let body = session.upload(&server.url("/upload"), file.path())?;

    assert_eq!(body, "stored");
    assert_eq!(session.code()?, 201);
    assert_eq!(session.info().upload_content_length, Some(13));

    server.verify();
    Ok(())
}

#[test]
fn authenticate_sends_basic_credentials() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/private"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome")),
    );
    server.mount(
        Mock::given(method("GET"))
            .and(path("/private"))
            .respond_with(ResponseTemplate::new(401)),
    );

    let mut session = Session::new()?;
    session.get(&server.url("/private"))?;
    assert_eq!(session.code()?, 401);

    let body = session.authenticate("user", "pass").get(&server.url("/private"))?;
    assert_eq!(body, "welcome");
    assert_eq!(session.code()?, 200);
    Ok(())
}

#[test]
fn headers_replace_previous_headers() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/headers"))
            .respond_with(|request: &Request| {
                let mut names: Vec<String> = request
                    .headers
                    .keys()
                    .map(|name| name.as_str().to_string())
                    .filter(|name| name.starts_with("x-"))
                    .collect();
                names.sort();
                ResponseTemplate::new(200).set_body_string(names.join(","))
            }),
    );

    let mut session = Session::new()?;

    session.headers([("X-Old", "1"), ("X-Shared", "a")])?;
    assert_eq!(session.get(&server.url("/headers"))?, "x-old,x-shared");

    session.headers([("X-New", "2")])?;
    assert_eq!(session.get(&server.url("/headers"))?, "x-new");

    session.header_lines(["X-Line: 3"])?;
    assert_eq!(session.get(&server.url("/headers"))?, "x-line");
    Ok(())
}

#[test]
fn referer_and_agent_are_sent() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/who"))
            .and(header("user-agent", "curlwrap-test/1.0"))
            .and(header("referer", "http://origin.example/"))
            .respond_with(ResponseTemplate::new(200)),
    );

    let mut session = Session::new()?;
    session
        .agent("curlwrap-test/1.0")?
        .referer("http://origin.example/")?;
    session.get(&server.url("/who"))?;

    assert_eq!(session.code()?, 200);
    Ok(())
}

#[test]
fn port_overrides_url_port() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong")),
    );

    let mut session = Session::new()?;
    let body = session.port(server.port()).get("http://127.0.0.1/ping")?;

    assert_eq!(body, "pong");
    assert!(session.error().is_empty());
    Ok(())
}

#[test]
fn redirects_are_followed_and_counted() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/middle")),
    );
    server.mount(
        Mock::given(path("/middle"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/end")),
    );
    server.mount(
        Mock::given(path("/end")).respond_with(echo_header("referer")),
    );

    let mut session = Session::new()?;
    let body = session.get(&server.url("/start"))?;

    assert_eq!(session.code()?, 200);
    assert_eq!(session.info().redirect_count, Some(2));
    assert_eq!(session.info().url.as_deref(), Some(server.url("/end").as_str()));
    // auto-referer points at the hop that redirected here
    assert_eq!(body, server.url("/middle"));
    Ok(())
}

#[test]
fn redirect_limit_is_enforced() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop")),
    );

    let mut session = Session::new()?;
    let body = session.get(&server.url("/loop"))?;

    assert!(body.is_empty());
    assert!(session.error().contains("Maximum (5) redirects followed"));
    assert_eq!(session.code()?, 302);
    assert_eq!(session.info().redirect_count, Some(5));
    assert_eq!(session.info().url.as_deref(), Some(server.url("/loop").as_str()));
    Ok(())
}

#[test]
fn post_redirect_switches_method_to_get() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(method("POST"))
            .and(path("/found"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/done")),
    );
    server.mount(
        Mock::given(method("POST"))
            .and(path("/temporary"))
            .respond_with(ResponseTemplate::new(307).insert_header("location", "/done")),
    );
    server.mount(
        Mock::given(path("/done")).respond_with(|request: &Request| {
            ResponseTemplate::new(200).set_body_string(request.method.to_string())
        }),
    );

    let mut session = Session::new()?;

    let body = session.post(&server.url("/found"), [("a", "1")])?;
    assert_eq!(body, "GET");
    assert_eq!(session.info().effective_method.as_deref(), Some("GET"));
    assert_eq!(session.info().redirect_count, Some(1));

    let body = session.post(&server.url("/temporary"), [("a", "1")])?;
    assert_eq!(body, "POST");
    assert_eq!(session.info().effective_method.as_deref(), Some("POST"));
    Ok(())
}

#[test]
fn redirects_can_be_disabled() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/start"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/end")),
    );

    let mut session = Session::new()?;
    session.follow_redirects(false);
    session.get(&server.url("/start"))?;

    assert_eq!(session.code()?, 302);
    assert_eq!(session.info().redirect_count, Some(0));
    assert!(session.error().is_empty());
    Ok(())
}

#[test]
fn unreachable_host_records_error() -> anyhow::Result<()> {
    let mut session = Session::new()?;
    session.connect_timeout(Duration::from_secs(2));
    let body = session.get("http://127.0.0.1:1/")?;

    assert!(body.is_empty());
    assert!(!session.error().is_empty());
    assert_eq!(session.code()?, 0);
    assert!(session.info().total_time.is_some());
    Ok(())
}

#[test]
fn invalid_url_records_error() -> anyhow::Result<()> {
    let mut session = Session::new()?;
    let body = session.get("definitely not a url")?;

    assert!(body.is_empty());
    assert!(session.error().starts_with("URL rejected"));
    assert_eq!(session.code()?, 0);
    Ok(())
}

#[test]
fn total_timeout_records_error() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/slow")).respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        ),
    );

    let mut session = Session::new()?;
    session.timeout(Duration::from_millis(200));
    let body = session.get(&server.url("/slow"))?;

    assert!(body.is_empty());
    assert!(!session.error().is_empty());
    assert!(session.info().total_time.unwrap() < 3.0);
    Ok(())
}

#[test]
fn timeout_mid_body_keeps_partial_response() -> anyhow::Result<()> {
    // Announces 100 bytes, sends 7, then stalls.
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = std::io::Read::read(&mut stream, &mut buf);
            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial");
            let _ = stream.flush();
            std::thread::sleep(Duration::from_secs(3));
        }
    });

    let mut session = Session::new()?;
    session.timeout(Duration::from_millis(500));
    let body = session.get(&format!("http://{}/stall", addr))?;

    assert_eq!(body, "partial");
    assert!(!session.error().is_empty());
    assert_eq!(session.code()?, 200);
    assert_eq!(session.info().size_download, Some(7));
    assert_eq!(session.info().download_content_length, Some(100));
    Ok(())
}

#[test]
fn error_clears_after_successful_transfer() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/ok")).respond_with(ResponseTemplate::new(200).set_body_string("fine")),
    );

    let mut session = Session::new()?;
    session.get("http://127.0.0.1:1/")?;
    assert!(!session.error().is_empty());

    let body = session.get(&server.url("/ok"))?;
    assert_eq!(body, "fine");
    assert!(session.error().is_empty());
    Ok(())
}

#[test]
fn cookies_live_for_the_session() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/login"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=abc; Path=/")),
    );
    server.mount(Mock::given(path("/me")).respond_with(echo_header("cookie")));

    let mut session = Session::new()?;
    session.get(&server.url("/login"))?;
    assert_eq!(session.get(&server.url("/me"))?, "sid=abc");

    // reconfiguring the client keeps the cookie session
    session.timeout(Duration::from_secs(10));
    assert_eq!(session.get(&server.url("/me"))?, "sid=abc");

    session.reset()?;
    assert_eq!(session.get(&server.url("/me"))?, "");
    Ok(())
}

#[test]
fn debug_does_not_change_results() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/hello")).respond_with(ResponseTemplate::new(200).set_body_string("hi")),
    );

    let mut session = Session::new()?;
    let plain = session.get(&server.url("/hello"))?;
    let plain_code = session.code()?;
    assert!(session.info().request_header.is_none());
    assert!(session.info_value("request_header").unwrap_err().is_unknown_info_key());

    let verbose = session.debug().get(&server.url("/hello"))?;
    assert_eq!(plain, verbose);
    assert_eq!(plain_code, session.code()?);

    let head = session.info().request_header.clone().unwrap_or_default();
    assert!(head.starts_with("GET /hello HTTP/1.1\r\n"));
    Ok(())
}

#[test]
fn info_lookup_by_key() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/hello")).respond_with(ResponseTemplate::new(200).set_body_string("hi")),
    );

    let mut session = Session::new()?;
    session.get(&server.url("/hello"))?;

    assert_eq!(session.info_value("http_code")?, JsonValue::from(200));
    assert_eq!(session.info_value("size_download")?, JsonValue::from(2));
    assert!(session.info_value("no_such_key").unwrap_err().is_unknown_info_key());

    let map = session.info_map();
    assert!(map.contains_key("total_time"));
    assert!(map.contains_key("url"));
    Ok(())
}

#[test]
fn reset_invalidates_results() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/hello")).respond_with(ResponseTemplate::new(200).set_body_string("hi")),
    );

    let mut session = Session::new()?;
    session.get(&server.url("/hello"))?;
    assert!(!session.info().is_empty());

    session.reset()?;
    assert!(session.error().is_empty());
    assert!(session.info().is_empty());
    assert!(session.last_response().is_empty());
    assert!(session.code().unwrap_err().is_unknown_info_key());
    Ok(())
}

#[test]
fn close_then_reset_reopens() -> anyhow::Result<()> {
    let server = TestServer::start();
    server.mount(
        Mock::given(path("/hello")).respond_with(ResponseTemplate::new(200).set_body_string("hi")),
    );

    let mut session = Session::new()?;
    session.close();
    assert!(session.get(&server.url("/hello")).unwrap_err().is_closed());

    session.reset()?;
    assert_eq!(session.get(&server.url("/hello"))?, "hi");
    Ok(())
}
