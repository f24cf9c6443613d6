//! Curated seed data applied through the same resolvers as ingested
//! rows, so re-seeding never duplicates anything.

use anyhow::Result;
use chrono::NaiveDate;
use shared::{CatalogStore, CompanyFields, GenreFields};
use tracing::info;

/// Well-known studios worth having before any crawl runs
const MAJOR_STUDIOS: &[(&str, &str, (i32, u32, u32))] = &[
    ("Studio Ghibli", "Japan", (1985, 6, 15)),
    ("Toei Animation", "Japan", (1948, 1, 23)),
    ("Madhouse", "Japan", (1972, 10, 17)),
    ("Bones", "Japan", (1998, 10, 1)),
    ("Shaft", "Japan", (1975, 9, 1)),
    ("WIT Studio", "Japan", (2012, 6, 1)),
    ("MAPPA", "Japan", (2011, 6, 14)),
    ("Pierrot", "Japan", (1979, 5, 8)),
    ("A-1 Pictures", "Japan", (2005, 5, 9)),
    ("Production I.G", "Japan", (1987, 12, 15)),
    ("Sunrise", "Japan", (1972, 9, 1)),
    ("Trigger", "Japan", (2011, 8, 22)),
    ("Kyoto Animation", "Japan", (1981, 7, 12)),
    ("Gainax", "Japan", (1984, 12, 24)),
    ("Gonzo", "Japan", (1992, 9, 6)),
    ("J.C.Staff", "Japan", (1986, 1, 18)),
    ("Lerche", "Japan", (2011, 8, 17)),
    ("White Fox", "Japan", (2007, 4, 1)),
    ("Ufotable", "Japan", (2000, 10, 1)),
    ("CloverWorks", "Japan", (2018, 4, 1)),
    ("Silver Link", "Japan", (2007, 12, 1)),
    ("Bind", "Japan", (2019, 1, 1)),
    ("8bit", "Japan", (2008, 9, 1)),
    ("Doga Kobo", "Japan", (1973, 8, 1)),
    ("Brain's Base", "Japan", (1996, 2, 1)),
    ("Passione", "Japan", (2011, 1, 1)),
    ("Orange", "Japan", (2004, 10, 1)),
    ("Studio Deen", "Japan", (1975, 1, 14)),
    ("TMS Entertainment", "Japan", (1964, 10, 1)),
    ("Xebec", "Japan", (1995, 5, 1)),
];

/// Genres common in anime discourse that the source listings lack
const CUSTOM_GENRES: &[(&str, &str)] = &[
    (
        "Isekai",
        "Stories involving characters transported to another world",
    ),
    ("Mecha", "Anime featuring giant robots or mechanical suits"),
    ("Magical Girl", "Stories featuring girls with magical powers"),
    ("Idol", "Anime about pop idols and their careers"),
    ("CGDCT", "Cute Girls Doing Cute Things"),
    (
        "Battle Royale",
        "Survival competitions with multiple participants",
    ),
    ("Time Loop", "Stories involving repeated time periods"),
    (
        "Reverse Harem",
        "One female character surrounded by multiple male characters",
    ),
    ("Otome", "Stories targeted at young women, often romantic"),
    ("Josei", "Anime targeted at adult women"),
    ("Seinen", "Anime targeted at adult men"),
    ("Shoujo", "Anime targeted at young girls"),
    ("Shounen", "Anime targeted at young boys"),
    ("Kodomomuke", "Anime targeted at children"),
];

/// Seed the company table with major studios; returns how many were new
pub fn seed_major_studios(store: &CatalogStore) -> Result<usize> {
    let before = count_rows(store, "company")?;

    for &(name, country, (year, month, day)) in MAJOR_STUDIOS {
        let fields = CompanyFields {
            country: Some(country.to_string()),
            founded: NaiveDate::from_ymd_opt(year, month, day),
        };
        store.resolve_company(name, &fields)?;
    }

    let created = count_rows(store, "company")? - before;
    info!(created, total = MAJOR_STUDIOS.len(), "Seeded major studios");
    Ok(created)
}

/// Seed the genre table with curated genres; returns how many were new
pub fn seed_custom_genres(store: &CatalogStore) -> Result<usize> {
    let before = count_rows(store, "genre")?;

    for &(name, description) in CUSTOM_GENRES {
        let fields = GenreFields {
            description: Some(description.to_string()),
        };
        store.resolve_genre(name, &fields)?;
    }

    let created = count_rows(store, "genre")? - before;
    info!(created, total = CUSTOM_GENRES.len(), "Seeded custom genres");
    Ok(created)
}

fn count_rows(store: &CatalogStore, table: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = store.database().conn().query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}
