use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera index (overrides the config file)
    #[arg(short, long)]
    pub cam_index: Option<u32>,

    /// Path to the JSON config file
    #[arg(long, default_value = "rusty_snap.json")]
    pub config: String,

    /// Hand landmark ONNX model (overrides the config file)
    #[arg(long)]
    pub model: Option<String>,

    /// Directory that saved photos go to (overrides the config file)
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Use a test pattern and a scripted hand instead of camera and model
    #[arg(long)]
    pub simulate: bool,

    /// Finger counts the simulated hand shows, e.g. "0,1,2,3" ('-' = no hand)
    #[arg(long, default_value = "0,1,2,3")]
    pub script: String,

    /// Mirror the camera output
    #[arg(long)]
    pub mirror: bool,

    /// List available cameras
    #[arg(long)]
    pub list: bool,

    /// Print state changes as JSON lines instead of text
    #[arg(long)]
    pub json: bool,
}
