use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use reqwest::{
    Client, StatusCode,
    multipart::{Form, Part},
};
use serde_json::{Value, json};

/// Walks a running server through upload, approval, tracking and deletion.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://localhost:3001")]
    base_url: String,

    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long, env = "ADMIN_PASSWORD")]
    password: String,

    /// PDF to upload, a generated 5000 byte payload otherwise
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = Client::new();
    let api = format!("{}/api", args.base_url.trim_end_matches('/'));

    println!("Logging in as {}", args.username);
    let login: Value = client
        .post(format!("{api}/login"))
        .json(&json!({ "username": args.username, "password": args.password }))
        .send()
        .await?
        .error_for_status()
        .context("Login failed")?
        .json()
        .await?;
    let token = login["token"].as_str().context("Login response has no token")?.to_string();

    let (file_name, bytes) = match &args.file {
        Some(path) => (
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("notes.pdf")
                .to_string(),
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => ("notes.pdf".to_string(), sample_pdf(5000)),
    };
    let size = bytes.len();

    println!("Uploading {file_name} ({size} bytes)");
    let form = Form::new()
        .text("title", "Calculus Notes")
        .text("author", "Jane")
        .part("file", Part::bytes(bytes).file_name(file_name).mime_str("application/pdf")?);
    let res = client.post(format!("{api}/pdfs/upload")).multipart(form).send().await?;
    if res.status() != StatusCode::CREATED {
        bail!("Upload returned {}: {}", res.status(), res.text().await?);
    }
    let note: Value = res.json().await?;
    let id = note["_id"].as_str().context("Upload response has no _id")?.to_string();
    expect(&note, "isApproved", json!(false))?;
    expect(&note, "fileSize", json!(size))?;

    println!("Approving {id}");
    let approved: Value = client
        .patch(format!("{api}/pdfs/{id}/approve"))
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    expect(&approved, "isApproved", json!(true))?;

    let public: Vec<Value> = client.get(format!("{api}/pdfs")).send().await?.error_for_status()?.json().await?;
    if !public.iter().any(|n| n["_id"] == note["_id"]) {
        bail!("Approved note {id} missing from the public list");
    }

    println!("Viewing {id} three times");
    let mut views = Value::Null;
    for _ in 0..3 {
        views = client
            .post(format!("{api}/pdfs/{id}/view"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
    }
    expect(&views, "views", json!(3))?;

    println!("Deleting {id}");
    client
        .delete(format!("{api}/pdfs/{id}"))
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?;

    let status = client.get(format!("{api}/pdfs/{id}")).bearer_auth(&token).send().await?.status();
    if status != StatusCode::NOT_FOUND {
        bail!("Deleted note {id} still answers with {status}");
    }

    println!("All checks passed");

    Ok(())
}

fn expect(body: &Value, key: &str, expected: Value) -> anyhow::Result<()> {
    if body[key] != expected {
        bail!("Expected {key} = {expected}, got {}", body[key]);
    }

    Ok(())
}

fn sample_pdf(size: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(size, b' ');
    bytes
}
