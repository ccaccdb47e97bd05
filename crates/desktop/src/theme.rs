use iced::color;
use iced::theme::Palette;
use iced::Theme;

use crate::settings::Appearance;

/// Builds the window theme. Photos read best on a dark background, so an
/// undetectable system preference resolves to dark.
pub fn resolve_theme(appearance: Appearance, high_contrast: bool) -> Theme {
    let dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => system_prefers_dark().unwrap_or(true),
    };
    Theme::custom("Facecam", palette(dark, high_contrast))
}

fn palette(dark: bool, high_contrast: bool) -> Palette {
    match (dark, high_contrast) {
        (true, false) => Palette {
            background: color!(0x17, 0x18, 0x1b),
            text: color!(0xd8, 0xd8, 0xdc),
            primary: color!(0x4f, 0x9c, 0xf9),
            success: color!(0x3c, 0xc8, 0x6b),
            warning: color!(0xf5, 0xb8, 0x2e),
            danger: color!(0xf2, 0x4c, 0x43),
        },
        (false, false) => Palette {
            background: color!(0xf4, 0xf4, 0xf6),
            text: color!(0x1c, 0x1c, 0x20),
            primary: color!(0x2f, 0x6f, 0xe4),
            success: color!(0x2e, 0xa0, 0x4f),
            warning: color!(0xd9, 0x8a, 0x00),
            danger: color!(0xd9, 0x32, 0x2a),
        },
        (true, true) => Palette {
            background: color!(0x00, 0x00, 0x00),
            text: color!(0xff, 0xff, 0xff),
            primary: color!(0x70, 0xb8, 0xff),
            success: color!(0x45, 0xe0, 0x70),
            warning: color!(0xff, 0xd6, 0x0a),
            danger: color!(0xff, 0x5a, 0x50),
        },
        (false, true) => Palette {
            background: color!(0xff, 0xff, 0xff),
            text: color!(0x00, 0x00, 0x00),
            primary: color!(0x00, 0x4a, 0xc8),
            success: color!(0x1d, 0x7a, 0x35),
            warning: color!(0x9a, 0x50, 0x00),
            danger: color!(0xc4, 0x00, 0x10),
        },
    }
}

/// `None` when the platform gives no answer.
fn system_prefers_dark() -> Option<bool> {
    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .ok()?;
        // the key is absent in light mode
        Some(
            String::from_utf8_lossy(&output.stdout)
                .trim()
                .eq_ignore_ascii_case("dark"),
        )
    }
    #[cfg(not(target_os = "macos"))]
    {
        None
    }
}
