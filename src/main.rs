use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "boardtt",
    version,
    about = "Slice scanned card sheets, OCR their text areas and render translated overlays"
)]
struct Cli {
    /// Project TOML describing the sheet layout and card types
    #[arg(short = 'p', long = "project", required_unless_present = "list_langs")]
    project: Option<String>,

    /// Scanned sheet image
    #[arg(required_unless_present = "list_langs")]
    image: Option<String>,

    /// Output root (default: image path without extension)
    #[arg(short = 'o', long = "target-dir")]
    target_dir: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// OCR language(s), e.g. eng or eng+rus (overrides [ocr].lang)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Classify one card type only and dump the pre-OCR crops of --area
    #[arg(long = "inspect")]
    inspect: Option<String>,

    /// Region reported by --inspect
    #[arg(long = "area", default_value = boardtt::DEFAULT_INSPECT_AREA)]
    area: String,

    /// Show installed tesseract languages and exit
    #[arg(long = "list-langs")]
    list_langs: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    boardtt::logging::init(cli.verbose)?;

    let output = boardtt::run(boardtt::Config {
        project: cli.project,
        image: cli.image,
        target_dir: cli.target_dir,
        settings_path: cli.read_settings,
        lang: cli.lang,
        inspect: cli.inspect,
        area: Some(cli.area),
        list_langs: cli.list_langs,
    })?;

    println!("{}", output);
    Ok(())
}
