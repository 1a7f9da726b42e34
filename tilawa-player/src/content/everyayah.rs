//! everyayah.com per-verse fallback URLs
//!
//! everyayah.com serves one file per verse, which makes it a dependable
//! fallback for reciters it carries.

const BASE_URL: &str = "https://everyayah.com/data";

/// everyayah.com folder for a reciter identifier
///
/// Matching is case-insensitive and ignores an `ar.` prefix.
pub fn reciter_folder(reciter: &str) -> Option<&'static str> {
    let key = reciter.trim();
    let key = key.strip_prefix("ar.").unwrap_or(key).to_ascii_lowercase();

    let folder = match key.as_str() {
        "alafasy" | "misharyrashidalafasy" => "Alafasy_128kbps",
        "mahermuaiqly" => "Maher_AlMuaiqly_64kbps",
        "husary" => "Husary_128kbps",
        "abdulbasitmurattal" => "Abdul_Basit_Murattal_128kbps",
        "sudais" => "Abdurrahmaan_As-Sudais_128kbps",
        "saoodshuraym" => "Saood_ash-Shuraym_128kbps",
        "abdullahbasfar" => "Abdullah_Basfar_128kbps",
        "faresabbad" => "Fares_Abbad_64kbps",
        _ => return None,
    };
    Some(folder)
}

/// Per-verse URL, e.g. `.../Alafasy_128kbps/002255.mp3`
pub fn verse_url(reciter: &str, surah: u16, ayah: u16) -> Option<String> {
    reciter_folder(reciter).map(|folder| format!("{}/{}/{:03}{:03}.mp3", BASE_URL, folder, surah, ayah))
}

/// Put the everyayah URL first among `fallbacks`, without duplicating it
pub fn prepend_fallback(fallbacks: &mut Vec<String>, reciter: &str, surah: u16, ayah: u16) {
    if let Some(url) = verse_url(reciter, surah, ayah) {
        if !fallbacks.contains(&url) {
            fallbacks.insert(0, url);
        }
    }
}
