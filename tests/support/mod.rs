#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use datafactory::{DataFactory, LoaderEntry, PathConfig, Resource, ResourceData, SaveError};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const PATH_PROPERTY: &str = "palette-path";
pub const WRITABLE_PROPERTY: &str = "palette-path-writable";

const HEADER: &str = "Palette";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Swatch {
    pub rgb: [u8; 3],
    pub label: String,
}

/// Minimal palette kind used across the suite.
///
/// The file format is a `Palette` header followed by one or more
/// `Name: ...` sections, each listing `r g b label` lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    pub swatches: Vec<Swatch>,
}

impl ResourceData for Palette {
    fn extension(&self) -> &str {
        ".palette"
    }

    fn can_save(&self) -> bool {
        true
    }

    fn save(&self, path: &Path) -> Result<(), SaveError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        fs::write(path, render(&[(name.as_str(), self)]))
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn duplicate(&self) -> Option<Self> {
        Some(self.clone())
    }
}

pub fn render(palettes: &[(&str, &Palette)]) -> String {
    let mut out = format!("{HEADER}\n");
    for (name, palette) in palettes {
        let _ = writeln!(out, "Name: {name}");
        for swatch in &palette.swatches {
            let [r, g, b] = swatch.rgb;
            let _ = writeln!(out, "{r} {g} {b} {}", swatch.label);
        }
    }
    out
}

/// Loader for `.palette` files; one resource per `Name:` section.
pub fn load_palettes(path: &Path) -> anyhow::Result<Vec<Resource<Palette>>> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    if lines.next().map(str::trim) != Some(HEADER) {
        bail!("missing '{HEADER}' header");
    }

    let mut parsed: Vec<(String, Palette)> = Vec::new();
    for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(name) = line.strip_prefix("Name:") {
            parsed.push((name.trim().to_string(), Palette::default()));
            continue;
        }
        let Some((_, palette)) = parsed.last_mut() else {
            bail!("color entry before any 'Name:' line");
        };
        let mut fields = line.splitn(4, ' ');
        let mut channel = || -> anyhow::Result<u8> {
            let field = fields.next().context("truncated color entry")?;
            field
                .parse()
                .with_context(|| format!("bad channel '{field}'"))
        };
        let rgb = [channel()?, channel()?, channel()?];
        let label = fields.next().unwrap_or_default().to_string();
        palette.swatches.push(Swatch { rgb, label });
    }

    if parsed.is_empty() {
        bail!("no palettes in file");
    }
    Ok(parsed
        .into_iter()
        .map(|(name, palette)| Resource::new(name, palette))
        .collect())
}

pub fn palette_factory() -> DataFactory<Palette> {
    DataFactory::new(
        "palettes",
        PATH_PROPERTY,
        WRITABLE_PROPERTY,
        vec![LoaderEntry::new(".palette", true, load_palettes)],
    )
    .with_constructor(|name| {
        let palette = Palette {
            swatches: vec![Swatch {
                rgb: [0, 0, 0],
                label: "Black".to_string(),
            }],
        };
        Some(Resource::new(name, palette))
    })
}

/// Palette factory that also owns a built-in standard palette.
pub fn palette_factory_with_standard() -> DataFactory<Palette> {
    palette_factory().with_standard(|| Resource::new("Standard", Palette::default()))
}

pub fn joined(dirs: &[&Path]) -> String {
    std::env::join_paths(dirs)
        .expect("test paths contain no separators")
        .to_string_lossy()
        .into_owned()
}

pub fn config_for(full: &[&Path], writable: &[&Path]) -> PathConfig {
    PathConfig::new()
        .with_property(PATH_PROPERTY, joined(full))
        .with_property(WRITABLE_PROPERTY, joined(writable))
}

/// Write a palette file holding one section per name.
pub fn write_palette_file(dir: &Path, file_name: &str, names: &[&str]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let palette = Palette {
        swatches: vec![Swatch {
            rgb: [255, 255, 255],
            label: "White".to_string(),
        }],
    };
    let sections: Vec<(&str, &Palette)> = names.iter().map(|name| (*name, &palette)).collect();
    let path = dir.join(file_name);
    fs::write(&path, render(&sections))?;
    Ok(path)
}

/// Push a file's modification time forward so a refresh sees it as changed.
pub fn bump_mtime(path: &Path) -> Result<()> {
    let current = fs::metadata(path)?.modified()?;
    let later = current.max(SystemTime::now()) + Duration::from_secs(10);
    File::options().write(true).open(path)?.set_modified(later)?;
    Ok(())
}

pub fn names(factory: &DataFactory<Palette>) -> Vec<String> {
    factory
        .container()
        .iter()
        .map(|resource| resource.name().to_string())
        .collect()
}
