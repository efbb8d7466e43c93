//! What a file is, judged by its extension alone

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ObjectKind {
	/// No extension, or one we don't recognize
	#[default]
	Unknown,
	Document,
	Text,
	Code,
	Image,
	Audio,
	Video,
	Archive,
	Executable,
	Font,
	Mesh,
	Database,
	Encrypted,
	Key,
	Book,
	Config,
}

impl ObjectKind {
	/// `extension` is expected lowercased, without the leading dot
	pub fn from_extension(extension: Option<&str>) -> Self {
		let Some(extension) = extension else {
			return Self::Unknown;
		};

		match extension {
			"jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" | "heic" | "heif"
			| "avif" | "svg" | "ico" | "raw" | "cr2" | "nef" | "arw" | "dng" | "psd" => Self::Image,
			"mp4" | "m4v" | "mov" | "qt" | "avi" | "mkv" | "webm" | "wmv" | "flv" | "mpg" | "mpeg"
			| "m2ts" | "mts" | "ts" | "3gp" | "ogv" | "vob" => Self::Video,
			"mp3" | "wav" | "flac" | "aac" | "m4a" | "ogg" | "oga" | "opus" | "wma" | "aiff"
			| "aif" | "mid" | "midi" => Self::Audio,
			"zip" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" | "7z" | "rar" | "lz4" | "iso"
			| "dmg" => Self::Archive,
			"exe" | "msi" | "app" | "apk" | "deb" | "rpm" | "appimage" | "bin" | "dll" | "so"
			| "dylib" => Self::Executable,
			"pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp"
			| "rtf" | "pages" | "numbers" | "key" => Self::Document,
			"epub" | "mobi" | "azw" | "azw3" => Self::Book,
			"txt" | "md" | "markdown" | "rst" | "log" | "csv" | "tsv" => Self::Text,
			"rs" | "c" | "h" | "cpp" | "hpp" | "cc" | "go" | "py" | "js" | "mjs" | "tsx"
			| "jsx" | "java" | "kt" | "swift" | "rb" | "php" | "cs" | "sh" | "bash" | "zsh"
			| "lua" | "sql" | "html" | "css" | "scss" | "vue" | "svelte" => Self::Code,
			"json" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "xml" | "env" => {
				Self::Config
			}
			"ttf" | "otf" | "woff" | "woff2" => Self::Font,
			"obj" | "fbx" | "stl" | "gltf" | "glb" | "ply" | "3ds" | "blend" => Self::Mesh,
			"db" | "sqlite" | "sqlite3" | "mdb" | "accdb" => Self::Database,
			"gpg" | "pgp" | "age" | "aes" => Self::Encrypted,
			"pem" | "crt" | "cer" | "der" | "p12" | "pfx" | "pub" | "asc" => Self::Key,
			_ => Self::Unknown,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extensions_map_to_kinds() {
		assert_eq!(ObjectKind::from_extension(Some("jpg")), ObjectKind::Image);
		assert_eq!(ObjectKind::from_extension(Some("mkv")), ObjectKind::Video);
		assert_eq!(ObjectKind::from_extension(Some("flac")), ObjectKind::Audio);
		assert_eq!(ObjectKind::from_extension(Some("pdf")), ObjectKind::Document);
		assert_eq!(ObjectKind::from_extension(Some("txt")), ObjectKind::Text);
		assert_eq!(ObjectKind::from_extension(Some("rs")), ObjectKind::Code);
		assert_eq!(ObjectKind::from_extension(Some("zip")), ObjectKind::Archive);
		assert_eq!(ObjectKind::from_extension(Some("exe")), ObjectKind::Executable);
		assert_eq!(ObjectKind::from_extension(Some("sqlite")), ObjectKind::Database);
		assert_eq!(ObjectKind::from_extension(Some("toml")), ObjectKind::Config);
	}

	#[test]
	fn missing_or_unknown_extensions_are_unknown() {
		assert_eq!(ObjectKind::from_extension(None), ObjectKind::Unknown);
		assert_eq!(ObjectKind::from_extension(Some("xyz123")), ObjectKind::Unknown);
	}

	#[test]
	fn kinds_are_stored_as_snake_case() {
		assert_eq!(ObjectKind::Executable.as_ref(), "executable");
		assert_eq!("image".parse::<ObjectKind>().unwrap(), ObjectKind::Image);
		assert!("hologram".parse::<ObjectKind>().is_err());
	}
}
