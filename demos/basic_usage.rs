use curlwrap::{Duration, Session};
use std::error::Error;

fn preview(body: &str, chars: usize) -> String {
    body.chars().take(chars).collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut session = Session::new()?;
    session
        .agent("curlwrap-demo/0.1")?
        .timeout(Duration::from_secs(30));

    println!("=== Basic GET Request ===");

    let body = session.get("https://httpbin.org/get")?;
    println!("Status: {}", session.code()?);
    println!("Total time: {:?}", session.info_value("total_time")?);
    println!("Body length: {} bytes", body.len());
    println!("First 200 chars: {}", preview(&body, 200));

    println!("\n=== POST Request with Form Data ===");

    let body = session.post(
        "https://httpbin.org/post",
        [("name", "curlwrap"), ("language", "rust")],
    )?;
    println!("Status: {}", session.code()?);
    println!("Response: {}", preview(&body, 300));

    println!("\n=== Authenticated Request with Headers ===");

    session
        .authenticate("user", "passwd")
        .headers([("Accept", "application/json")])?;
    let body = session.get("https://httpbin.org/basic-auth/user/passwd")?;
    println!("Status: {}", session.code()?);
    println!("Response: {}", preview(&body, 200));

    println!("\n=== Error Handling Example ===");

    session.reset()?.connect_timeout(Duration::from_secs(2));
    let body = session.get("http://127.0.0.1:1/")?;
    println!("Body: {:?}", body);
    println!("Status: {}", session.code()?);
    println!("Error: {}", session.error());

    println!("\n=== Metadata ===");
    println!("{}", serde_json::to_string_pretty(&session.info_map())?);

    session.close();
    println!("\n=== All examples completed! ===");

    Ok(())
}
