use std::collections::HashSet;

use maud::{DOCTYPE, Markup, html};

use crate::{
    assets::Assets,
    models::{Dashboard, EntryDetails, GroupListing, Person, ScoreBand},
    tmdb::{self, SearchResult},
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";
const THUMB_SIZE: &str = "w92";

pub fn login_page(assets: &Assets, redirect: &str, error: Option<&str>) -> String {
    page(
        "Sign in",
        Some(assets),
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-md w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Seenema" }
                        @if let Some(error) = error {
                            p class="mt-4 text-sm text-red-600" { (error) }
                        }
                        form class="mt-6 space-y-6" method="post" action="/login" {
                            input type="hidden" name="redirect" value=(redirect);
                            div {
                                label class="block text-sm font-medium text-gray-700" for="token" { "Access token" }
                                input class="mt-2 w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500" type="password" name="token" id="token" required autofocus;
                            }
                            button class="w-full rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Sign in" }
                        }
                    }
                }
            }
        },
    )
}

pub fn dashboard_page(assets: &Assets, dashboard: &Dashboard) -> String {
    page(
        "Seenema",
        Some(assets),
        html! {
            (header(dashboard.current_group))
            main class="max-w-5xl mx-auto px-6 py-8 space-y-10" {
                @if dashboard.groups.is_empty() {
                    div class="bg-white shadow rounded-lg p-8" {
                        p class="text-gray-600" { "Nothing here yet. Search for a movie to start group 1." }
                    }
                }
                @for group in &dashboard.groups {
                    (group_section(group, &dashboard.persons, dashboard.current_group))
                }
            }
        },
    )
}

pub fn group_page(assets: &Assets, group: &GroupListing, persons: &[Person], current_group: i32) -> String {
    page(
        &format!("Group {}", group.number),
        Some(assets),
        html! {
            (header(current_group))
            main class="max-w-5xl mx-auto px-6 py-8" {
                (group_section(group, persons, current_group))
            }
        },
    )
}

pub fn search_page(
    assets: &Assets,
    query: &str,
    results: &[SearchResult],
    known: &HashSet<i32>,
    current_group: i32,
) -> String {
    page(
        &format!("Search: {query}"),
        Some(assets),
        html! {
            (header(current_group))
            main class="max-w-4xl mx-auto px-6 py-8" {
                h1 class="text-2xl font-bold text-gray-900" { "Results for “" (query) "”" }
                @if results.is_empty() {
                    p class="mt-6 text-gray-600" { "No movies found." }
                } @else {
                    ul class="mt-6 space-y-3" {
                        @for result in results {
                            li class="bg-white shadow rounded-lg p-4 flex gap-4" {
                                @if let Some(src) = result.poster_path.as_deref().and_then(|p| tmdb::poster_url(p, THUMB_SIZE)) {
                                    img class="w-12 rounded" src=(src) alt="";
                                }
                                div class="flex-1" {
                                    h2 class="font-semibold text-gray-900" {
                                        (result.title)
                                        @if let Some(year) = result.release_year() {
                                            span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                                        }
                                        @if known.contains(&result.id) {
                                            span class="ml-2 rounded bg-gray-100 px-2 py-0.5 text-xs text-gray-600" { "in library" }
                                        }
                                    }
                                    p class="mt-1 text-sm text-gray-600 line-clamp-2" { (result.overview) }
                                }
                                form class="flex items-center gap-2" method="post" action="/movies" {
                                    input type="hidden" name="tmdb_id" value=(result.id);
                                    input class="w-16 rounded-md border border-gray-300 px-2 py-1 text-sm" type="number" min="1" name="group_number" value=(current_group);
                                    button class="rounded-md bg-blue-600 px-3 py-1 text-sm font-semibold text-white hover:bg-blue-700" type="submit" { "Add" }
                                }
                            }
                        }
                    }
                }
            }
        },
    )
}

pub fn entry_page(assets: &Assets, details: &EntryDetails, persons: &[Person], current_group: i32) -> String {
    let movie = &details.movie;
    let entry = &details.entry;
    let base = format!("/entries/{}", entry.id);

    page(
        &movie.title,
        Some(assets),
        html! {
            (header(current_group))
            main class="max-w-4xl mx-auto px-6 py-8 space-y-6" {
                div class="bg-white shadow rounded-lg p-6 flex gap-6" {
                    @if let Some(src) = &movie.poster_url {
                        img class="w-40 rounded" src=(src) alt=(movie.title);
                    }
                    div {
                        h1 class="text-3xl font-bold text-gray-900" {
                            (movie.title)
                            @if let Some(year) = movie.release_year {
                                span class="ml-2 font-normal text-gray-500" { "(" (year) ")" }
                            }
                        }
                        p class="mt-1 text-sm text-gray-500" {
                            "Group " (entry.group_number)
                            @let runtime = movie.formatted_runtime();
                            @if !runtime.is_empty() { " · " (runtime) }
                            @if let Some(picker) = &details.picked_by { " · picked by " (picker.name) }
                        }
                        @if let Some(synopsis) = &movie.synopsis {
                            p class="mt-4 text-gray-700" { (synopsis) }
                        }
                        @if let Some(tmdb_id) = movie.tmdb_id {
                            a class="mt-2 inline-block text-sm text-gray-500 hover:text-gray-700" href=(format!("https://www.themoviedb.org/movie/{tmdb_id}")) target="_blank" rel="noopener noreferrer" { "TMDB" }
                        }
                    }
                }

                section class="bg-white shadow rounded-lg p-6" {
                    h2 class="text-lg font-semibold text-gray-900" {
                        "Ratings"
                        span class="ml-2 text-sm font-normal text-gray-500" {
                            (average_label(details)) " · " (details.rating_count()) "/" (persons.len())
                        }
                    }
                    div class="mt-4 grid gap-4 md:grid-cols-2" {
                        @for person in persons {
                            @let rating = details.rating_for(person.id);
                            div class="border rounded-md p-3" {
                                div class="flex items-center justify-between" {
                                    span class="font-medium text-gray-800" { (person.name) }
                                    @if let Some(rating) = rating {
                                        span class=(score_class(rating.band())) { (format!("{:.1}", rating.score)) }
                                    } @else {
                                        span class="text-gray-400" { "–" }
                                    }
                                }
                                form class="mt-2 flex gap-2" method="post" action="/ratings" {
                                    input type="hidden" name="entry_id" value=(entry.id);
                                    input type="hidden" name="person_id" value=(person.id);
                                    input class="w-20 rounded-md border border-gray-300 px-2 py-1 text-sm" type="number" name="score" min="0" max="10" step="0.1" required value=[rating.map(|r| r.score)];
                                    button class="rounded-md bg-blue-600 px-3 py-1 text-sm text-white hover:bg-blue-700" type="submit" { "Save" }
                                }
                                @if rating.is_some() {
                                    form method="post" action=(format!("/ratings/{}/{}/delete", entry.id, person.id)) {
                                        button class="mt-1 text-xs text-red-600 hover:text-red-800" type="submit" { "Remove" }
                                    }
                                }
                            }
                        }
                    }
                }

                section class="bg-white shadow rounded-lg p-6" {
                    h2 class="text-lg font-semibold text-gray-900" { "Watched" }
                    @if let Some(date) = entry.watched_on {
                        p class="mt-2 text-gray-700" { "Watched on " (date) }
                        form class="mt-2" method="post" action=(format!("{base}/unwatched")) {
                            button class="text-sm text-blue-600 hover:text-blue-800" type="submit" { "Mark unwatched" }
                        }
                    } @else {
                        form class="mt-2 flex gap-2" method="post" action=(format!("{base}/watched")) {
                            input class="rounded-md border border-gray-300 px-2 py-1 text-sm" type="date" name="watched_on";
                            button class="rounded-md bg-blue-600 px-3 py-1 text-sm text-white hover:bg-blue-700" type="submit" { "Mark watched" }
                        }
                    }
                }

                section class="bg-white shadow rounded-lg p-6" {
                    h2 class="text-lg font-semibold text-gray-900" { "Edit" }
                    form class="mt-4 space-y-4" method="post" action=(base) {
                        div {
                            label class="block text-sm font-medium text-gray-700" for="group_number" { "Group" }
                            input class="mt-1 w-24 rounded-md border border-gray-300 px-2 py-1" type="number" min="1" name="group_number" id="group_number" value=(entry.group_number);
                        }
                        div {
                            label class="block text-sm font-medium text-gray-700" for="picked_by_person_id" { "Picked by" }
                            select class="mt-1 rounded-md border border-gray-300 px-2 py-1" name="picked_by_person_id" id="picked_by_person_id" {
                                option value="" selected[entry.picked_by_id.is_none()] { "Nobody" }
                                @for person in persons {
                                    option value=(person.id) selected[entry.picked_by_id == Some(person.id)] { (person.name) }
                                }
                            }
                        }
                        div {
                            label class="block text-sm font-medium text-gray-700" for="notes" { "Notes" }
                            textarea class="mt-1 w-full rounded-md border border-gray-300 px-2 py-1" name="notes" id="notes" rows="3" {
                                (entry.notes.as_deref().unwrap_or_default())
                            }
                        }
                        button class="rounded-md bg-blue-600 px-4 py-2 font-semibold text-white hover:bg-blue-700" type="submit" { "Save" }
                    }
                    form class="mt-6" method="post" action=(format!("{base}/delete")) data-confirm="Remove this entry and its ratings?" {
                        button class="text-sm text-red-600 hover:text-red-800" type="submit" { "Delete entry" }
                    }
                }
            }
        },
    )
}

pub fn error_page(message: &str) -> String {
    page(
        "Error",
        None,
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Error" }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, assets: Option<&Assets>, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                script src=(TAILWIND_CDN) {}
                @if let Some(assets) = assets {
                    link rel="stylesheet" href=(assets.url("/static/app.css"));
                    script defer src=(assets.url("/static/app.js")) {}
                }
            }
            body class="bg-gray-50" { (body) }
        }
    }
    .into_string()
}

fn header(current_group: i32) -> Markup {
    html! {
        header class="bg-white shadow" {
            div class="max-w-5xl mx-auto px-6 py-4 flex items-center justify-between gap-6" {
                a class="text-xl font-bold text-gray-900" href="/" { "Seenema" }
                form class="flex-1 max-w-md" method="get" action="/search" {
                    input class="w-full rounded-md border border-gray-300 px-3 py-2 focus:border-blue-500 focus:outline-none focus:ring-1 focus:ring-blue-500" type="search" name="q" placeholder="Search movies";
                }
                span class="text-sm text-gray-500" { "Current group " (current_group) }
                form method="post" action="/logout" {
                    button class="text-sm text-gray-500 hover:text-gray-700" type="submit" { "Sign out" }
                }
            }
        }
    }
}

fn group_section(group: &GroupListing, persons: &[Person], current_group: i32) -> Markup {
    html! {
        section id=(format!("group-{}", group.number)) {
            h2 class="text-2xl font-bold text-gray-900" {
                a href=(format!("/groups/{}", group.number)) { "Group " (group.number) }
                @if group.number == current_group {
                    span class="ml-2 rounded bg-blue-100 px-2 py-0.5 text-xs font-medium text-blue-700" { "current" }
                }
            }
            div class="mt-4 grid gap-4 md:grid-cols-2" {
                @for details in &group.entries {
                    (entry_card(details, persons))
                }
            }
        }
    }
}

fn entry_card(details: &EntryDetails, persons: &[Person]) -> Markup {
    let movie = &details.movie;
    html! {
        a class="bg-white shadow rounded-lg p-4 flex gap-4 hover:shadow-md" href=(format!("/entries/{}", details.entry.id)) {
            @if let Some(src) = &movie.poster_url {
                img class="w-16 rounded" src=(src) alt="";
            }
            div class="flex-1" {
                h3 class="font-semibold text-gray-900" {
                    (movie.title)
                    @if let Some(year) = movie.release_year {
                        span class="ml-1 font-normal text-gray-500" { "(" (year) ")" }
                    }
                }
                p class="mt-1 text-sm text-gray-500" {
                    @if details.entry.is_watched() { "watched" } @else { "not watched" }
                    @if let Some(picker) = &details.picked_by { " · " (picker.code) }
                }
                div class="mt-2 flex flex-wrap gap-2 text-sm" {
                    @for person in persons {
                        @match details.rating_for(person.id) {
                            Some(rating) => {
                                span class=(score_class(rating.band())) { (person.code) " " (format!("{:.1}", rating.score)) }
                            }
                            None => {
                                span class="text-gray-300" { (person.code) }
                            }
                        }
                    }
                    span class="ml-auto font-medium text-gray-700" {
                        (average_label(details))
                        @if details.is_fully_rated(persons) { " ✓" }
                    }
                }
            }
        }
    }
}

fn average_label(details: &EntryDetails) -> String {
    match details.average_rating() {
        Some(avg) => format!("avg {avg:.1}"),
        None => "unrated".to_string(),
    }
}

fn score_class(band: ScoreBand) -> String {
    format!("rating {}", band.css_class())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_escapes_message() {
        let html = error_page("<script>alert(1)</script>");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
    }

    #[test]
    fn score_classes_follow_bands() {
        assert_eq!(score_class(ScoreBand::of(3.9)), "rating rating-low");
        assert_eq!(score_class(ScoreBand::of(7.0)), "rating rating-high");
    }
}
