use std::path::PathBuf;

use clap::Args;

use crate::codec::DEFAULT_QUALITY;
use crate::reference::ReferenceLibrary;

/// Settings shared by every subcommand; flags fall back to environment variables.
#[derive(Args, Clone, Debug)]
pub struct Settings {
    /// Directory holding the JSON record collections
    #[arg(long, env = "DAMAGE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Directory holding front.png, back.png, side.png and top.png
    #[arg(long, env = "DAMAGE_REFERENCE_DIR", default_value = "./assets/views")]
    pub reference_dir: PathBuf,

    /// Surface width in pixels
    #[arg(long, env = "DAMAGE_SURFACE_WIDTH", default_value_t = 800)]
    pub width: u32,

    /// Surface height in pixels
    #[arg(long, env = "DAMAGE_SURFACE_HEIGHT", default_value_t = 500)]
    pub height: u32,

    /// JPEG quality between 0 and 1
    #[arg(long, env = "DAMAGE_QUALITY", default_value_t = DEFAULT_QUALITY, value_parser = parse_quality)]
    pub quality: f32,
}

impl Settings {
    pub fn references(&self) -> ReferenceLibrary {
        ReferenceLibrary::new(&self.reference_dir)
    }
}

fn parse_quality(raw: &str) -> Result<f32, String> {
    let q: f32 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&q) {
        Ok(q)
    } else {
        Err(format!("quality must be between 0 and 1, got {q}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        settings: Settings,
    }

    fn declared_default(id: &str) -> String {
        let command = Harness::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_id() == id)
            .unwrap_or_else(|| panic!("no argument {id}"));
        arg.get_default_values()[0].to_string_lossy().into_owned()
    }

    // reads the declared defaults so DAMAGE_* variables in the environment do not leak in
    #[test]
    fn test_declared_defaults() {
        assert_eq!(declared_default("width"), "800");
        assert_eq!(declared_default("height"), "500");
        assert_eq!(declared_default("quality"), DEFAULT_QUALITY.to_string());
        assert_eq!(declared_default("data_dir"), "./data");
        assert_eq!(declared_default("reference_dir"), "./assets/views");
    }

    #[test]
    fn test_flags_are_parsed() {
        let settings = Harness::try_parse_from([
            "damage-annotate",
            "--data-dir",
            "/tmp/records",
            "--reference-dir",
            "/tmp/views",
            "--width",
            "640",
            "--height",
            "480",
            "--quality",
            "0.5",
        ])
        .unwrap()
        .settings;
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/records"));
        assert_eq!(settings.width, 640);
        assert_eq!(settings.height, 480);
        assert_eq!(settings.quality, 0.5);
        assert_eq!(
            settings.references().source_for(crate::reference::VehicleView::Top).path(),
            std::path::Path::new("/tmp/views/top.png")
        );
    }

    #[test]
    fn test_quality_out_of_range_is_rejected() {
        assert!(Harness::try_parse_from(["damage-annotate", "--quality", "1.5"]).is_err());
        let ok = Harness::try_parse_from(["damage-annotate", "--quality", "0.4"]).unwrap();
        assert_eq!(ok.settings.quality, 0.4);
    }
}
