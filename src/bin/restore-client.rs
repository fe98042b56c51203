use argh::FromArgs;
use base64::{Engine, engine::general_purpose::STANDARD};
use infernum_restore::{
    Task,
    messages::{ErrorResponse, RestoreRequest, RestoreResponse},
    server::UPLOAD_FIELD,
};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8000;

#[derive(FromArgs)]
/// Client for the image restoration server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "json", "upload" or "endpoints"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Json(JsonCommand),
    Upload(UploadCommand),
    Endpoints(EndpointsCommand),
}

#[derive(FromArgs)]
/// Send an image as a base64 JSON payload
#[argh(subcommand, name = "json")]
struct JsonCommand {
    /// the restoration task: derain, gaussian_denoise or real_denoise
    #[argh(option, short = 't')]
    task: Task,

    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// where to write the restored PNG
    #[argh(option, short = 'o')]
    output_path: PathBuf,
}

#[derive(FromArgs)]
/// Upload an image as a multipart file
#[argh(subcommand, name = "upload")]
struct UploadCommand {
    /// the restoration task: derain, gaussian-denoise or real-denoise
    #[argh(option, short = 't')]
    task: Task,

    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// where to write the restored PNG
    #[argh(option, short = 'o')]
    output_path: PathBuf,
}

#[derive(FromArgs)]
/// List the endpoints the server exposes
#[argh(subcommand, name = "endpoints")]
struct EndpointsCommand {}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResponse>().await {
        Ok(body) => format!("{status}: {}", body.error),
        Err(_) => status.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Json(command) => {
            let image = std::fs::read(&command.image_path)?;
            let response = client
                .post(format!("http://{}/{}", addr, command.task.as_str()))
                .json(&RestoreRequest {
                    image: STANDARD.encode(image),
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(error_message(response).await.into());
            }

            let result = response.json::<RestoreResponse>().await?;
            std::fs::write(&command.output_path, STANDARD.decode(result.enhanced_image)?)?;
            println!("Restored image written to {}", command.output_path.display());
        }
        ClientCommands::Upload(command) => {
            let image = std::fs::read(&command.image_path)?;
            let file_name = command
                .image_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let part = Part::bytes(image)
                .file_name(file_name)
                .mime_str(mime_for(&command.image_path))?;

            let response = client
                .post(format!("http://{}/{}", addr, command.task.slug()))
                .multipart(Form::new().part(UPLOAD_FIELD, part))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(error_message(response).await.into());
            }

            std::fs::write(&command.output_path, response.bytes().await?)?;
            println!("Restored image written to {}", command.output_path.display());
        }
        ClientCommands::Endpoints(_) => {
            let response = client.get(format!("http://{}/", addr)).send().await?;

            let result = response.json::<serde_json::Value>().await?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
