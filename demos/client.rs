use argh::FromArgs;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use stylize::messages::{ErrorResponse, StatusResponse};

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5002;

#[derive(FromArgs)]
/// Style transfer client
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "stylize", "combine" or "status"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Stylize(StylizeCommand),
    Combine(CombineCommand),
    Status(StatusCommand),
}

#[derive(FromArgs)]
/// Stylize a content image with a style image
#[argh(subcommand, name = "stylize")]
struct StylizeCommand {
    /// the content image
    #[argh(option, short = 'c')]
    content: PathBuf,

    /// the style image
    #[argh(option, short = 's')]
    style: PathBuf,

    /// style strength between 0 and 1
    #[argh(option, short = 'r')]
    ratio: Option<f32>,

    /// where to write the stylized JPEG
    #[argh(option, short = 'o', default = "PathBuf::from(\"stylized.jpg\")")]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Stylize a content image with a mix of two styles
#[argh(subcommand, name = "combine")]
struct CombineCommand {
    /// the content image
    #[argh(option, short = 'c')]
    content: PathBuf,

    /// the first style image
    #[argh(option)]
    style1: PathBuf,

    /// the second style image
    #[argh(option)]
    style2: PathBuf,

    /// weight of the second style between 0 and 1
    #[argh(option, short = 'r')]
    ratio: Option<f32>,

    /// where to write the stylized JPEG
    #[argh(option, short = 'o', default = "PathBuf::from(\"combined.jpg\")")]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Check whether the model is busy
#[argh(subcommand, name = "status")]
struct StatusCommand {}

fn file_part(path: &Path) -> std::io::Result<Part> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Part::bytes(std::fs::read(path)?).file_name(name))
}

fn with_ratio(form: Form, ratio: Option<f32>) -> Form {
    match ratio {
        Some(ratio) => form.text("style_ratio", ratio.to_string()),
        None => form,
    }
}

async fn save_image(
    response: reqwest::Response,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if !response.status().is_success() {
        let status = response.status();
        let error = response.json::<ErrorResponse>().await?;
        return Err(format!("{status}: {} ({})", error.error, error.kind).into());
    }
    std::fs::write(output, response.bytes().await?)?;
    println!("Stylized image saved to {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Stylize(command) => {
            let form = Form::new()
                .part("content_image", file_part(&command.content)?)
                .part("style_image", file_part(&command.style)?);
            let response = client
                .post(format!("http://{}/stylize", addr))
                .multipart(with_ratio(form, command.ratio))
                .send()
                .await?;
            save_image(response, &command.output).await?;
        }
        ClientCommands::Combine(command) => {
            let form = Form::new()
                .part("content_image", file_part(&command.content)?)
                .part("style_image_1", file_part(&command.style1)?)
                .part("style_image_2", file_part(&command.style2)?);
            let response = client
                .post(format!("http://{}/combine-styles", addr))
                .multipart(with_ratio(form, command.ratio))
                .send()
                .await?;
            save_image(response, &command.output).await?;
        }
        ClientCommands::Status(_) => {
            let status = client
                .get(format!("http://{}/status", addr))
                .send()
                .await?
                .json::<StatusResponse>()
                .await?;
            println!("Model is {}", status.status);
        }
    }

    Ok(())
}
