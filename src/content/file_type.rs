//! Asset file types and target platforms

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Global cooker version. Bumping it invalidates every cooked output.
pub const COOKER_VERSION: u32 = 1;

/// Target platform of a cook session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Platform {
    #[default]
    PC,
    IOS,
    Android,
    Linux,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::PC,
        Platform::IOS,
        Platform::Android,
        Platform::Linux,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Platform::PC => "PC",
            Platform::IOS => "IOS",
            Platform::Android => "Android",
            Platform::Linux => "Linux",
        }
    }

    /// Name of the generated source folder owned by this platform
    pub fn generated_dir_name(self) -> String {
        format!("Generated{}", self.name())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}

/// Type tag of a source or cooked asset
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum FileType {
    #[default]
    Unknown,
    Animation2D,
    Csv,
    Effect,
    EffectHeader,
    Font,
    FxBank,
    Json,
    Protobuf,
    SceneAsset,
    ScenePrefab,
    Script,
    ScriptProject,
    Cs,
    SoundBank,
    SoundProject,
    Texture0,
    Texture1,
    Texture2,
    Texture3,
    Texture4,
    Text,
    UIMovie,
    Wav,
    Xml,
}

struct TypeInfo {
    name: &'static str,
    source_ext: &'static str,
    cooked_ext: &'static str,
    needs_cooking: bool,
    data_version: u32,
}

const fn info(
    name: &'static str,
    source_ext: &'static str,
    cooked_ext: &'static str,
    needs_cooking: bool,
    data_version: u32,
) -> TypeInfo {
    TypeInfo {
        name,
        source_ext,
        cooked_ext,
        needs_cooking,
        data_version,
    }
}

impl FileType {
    pub const ALL: [FileType; 25] = [
        FileType::Unknown,
        FileType::Animation2D,
        FileType::Csv,
        FileType::Effect,
        FileType::EffectHeader,
        FileType::Font,
        FileType::FxBank,
        FileType::Json,
        FileType::Protobuf,
        FileType::SceneAsset,
        FileType::ScenePrefab,
        FileType::Script,
        FileType::ScriptProject,
        FileType::Cs,
        FileType::SoundBank,
        FileType::SoundProject,
        FileType::Texture0,
        FileType::Texture1,
        FileType::Texture2,
        FileType::Texture3,
        FileType::Texture4,
        FileType::Text,
        FileType::UIMovie,
        FileType::Wav,
        FileType::Xml,
    ];

    pub const TEXTURES: [FileType; 5] = [
        FileType::Texture0,
        FileType::Texture1,
        FileType::Texture2,
        FileType::Texture3,
        FileType::Texture4,
    ];

    fn info(self) -> TypeInfo {
        match self {
            FileType::Unknown => info("Unknown", "", "", false, 1),
            FileType::Animation2D => info("Animation2D", ".son", ".saf", true, 10),
            FileType::Csv => info("Csv", ".csv", ".csz", true, 1),
            FileType::Effect => info("Effect", ".fx", ".fxc", true, 1),
            FileType::EffectHeader => info("EffectHeader", ".fxh", ".fxh", false, 1),
            FileType::Font => info("Font", ".ttf", ".sff", true, 7),
            FileType::FxBank => info("FxBank", ".fxb", ".fxbc", true, 3),
            FileType::Json => info("Json", ".json", ".sjz", true, 1),
            FileType::Protobuf => info("Protobuf", ".proto", ".pb", true, 1),
            FileType::SceneAsset => info("SceneAsset", ".fbx", ".ssa", true, 2),
            FileType::ScenePrefab => info("ScenePrefab", ".prefab", ".spf", true, 2),
            FileType::Script => info("Script", ".lua", ".lbc", true, 7),
            FileType::ScriptProject => info("ScriptProject", ".csproj", ".spj", true, 1),
            FileType::Cs => info("Cs", ".cs", ".cs", false, 1),
            FileType::SoundBank => info("SoundBank", ".bank", ".bank", false, 13),
            FileType::SoundProject => info("SoundProject", ".fspro", ".fev", true, 13),
            FileType::Texture0 => info("Texture0", ".png", ".sif0", true, 3),
            FileType::Texture1 => info("Texture1", ".png", ".sif1", true, 3),
            FileType::Texture2 => info("Texture2", ".png", ".sif2", true, 3),
            FileType::Texture3 => info("Texture3", ".png", ".sif3", true, 3),
            FileType::Texture4 => info("Texture4", ".png", ".sif4", true, 3),
            FileType::Text => info("Text", ".txt", ".txz", true, 1),
            FileType::UIMovie => info("UIMovie", ".fla", ".fcn", true, 9),
            FileType::Wav => info("Wav", ".wav", ".wav", false, 1),
            FileType::Xml => info("Xml", ".xml", ".xmz", true, 1),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn source_extension(self) -> &'static str {
        self.info().source_ext
    }

    pub fn cooked_extension(self) -> &'static str {
        self.info().cooked_ext
    }

    /// Whether files of this type are produced by a cook task
    pub fn needs_cooking(self) -> bool {
        self.info().needs_cooking
    }

    /// Built-in binary format version of cooked files of this type
    pub fn data_version(self) -> u32 {
        self.info().data_version
    }

    /// One-to-one types map exactly one source to one output and carry
    /// no per-file metadata record.
    pub fn is_one_to_one(self) -> bool {
        !matches!(
            self,
            FileType::Effect | FileType::ScriptProject | FileType::SoundProject | FileType::UIMovie
        )
    }

    pub fn is_texture(self) -> bool {
        Self::TEXTURES.contains(&self)
    }

    /// All texture levels share one source; index them under level 0.
    pub fn normalized(self) -> FileType {
        if self.is_texture() {
            FileType::Texture0
        } else {
            self
        }
    }

    /// Type of a source file from its extension (case-insensitive).
    /// Texture sources resolve to `Texture0`.
    pub fn from_source_extension(ext: &str) -> Option<FileType> {
        Self::ALL.into_iter().find(|t| {
            !t.source_extension().is_empty() && t.source_extension().eq_ignore_ascii_case(ext)
        })
    }

    /// Type of a cooked file from its extension (case-insensitive)
    pub fn from_cooked_extension(ext: &str) -> Option<FileType> {
        Self::ALL.into_iter().find(|t| {
            t.needs_cooking()
                && !t.cooked_extension().is_empty()
                && t.cooked_extension().eq_ignore_ascii_case(ext)
        })
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown file type '{s}'"))
    }
}
