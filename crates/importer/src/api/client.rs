//! Jikan API client with rate limiting and retry logic.
//!
//! All network access funnels through [`JikanClient::fetch`], which turns
//! every transport- or protocol-level failure into a [`FetchOutcome`]; no
//! raw reqwest error ever reaches the pipelines.

use super::rate_limiter::RateLimiter;
use super::types::*;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Why a fetch ran out of retries
#[derive(Debug, Clone, Error)]
pub enum FetchFailure {
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("HTTP {status} after {attempts} attempts")]
    Http { status: u16, attempts: u32 },
    #[error("transport error after {attempts} attempts: {message}")]
    Transport { message: String, attempts: u32 },
    #[error("undecodable payload after {attempts} attempts: {message}")]
    Decode { message: String, attempts: u32 },
}

/// Outcome of one logical fetch, retries included
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// HTTP 200 with a decodable body
    Success(T),
    /// HTTP 404; absence is definitive and never retried
    NotFound,
    /// All retry attempts consumed; carries the last failure seen
    ExhaustedRetries(FetchFailure),
}

impl<T> FetchOutcome<T> {
    /// Map the success payload, keeping the other variants as-is
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Success(value) => FetchOutcome::Success(f(value)),
            FetchOutcome::NotFound => FetchOutcome::NotFound,
            FetchOutcome::ExhaustedRetries(failure) => FetchOutcome::ExhaustedRetries(failure),
        }
    }
}

/// Backoff for HTTP 429: `min(base * 2^attempt, cap)`
pub(crate) fn rate_limit_backoff(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).min(cap)
}

/// Backoff for transient errors: `2^attempt` seconds
pub(crate) fn transient_backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Jikan API v4 client
pub struct JikanClient {
    /// HTTP client
    client: Client,
    /// Base URL for Jikan API
    base_url: String,
    /// Rate limiter applied before every attempt
    rate_limiter: RateLimiter,
    /// Maximum attempts for one logical fetch
    max_retries: u32,
    /// Base backoff for 429 responses
    rate_limit_backoff: Duration,
    /// Cap for the 429 backoff ladder
    backoff_cap: Duration,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(
        base_url: String,
        requests_per_second: f64,
        requests_per_minute: u32,
        max_retries: u32,
        rate_limit_backoff_secs: u64,
        backoff_cap_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("anime-catalog-importer/0.1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            rate_limiter: RateLimiter::new(requests_per_second, requests_per_minute),
            max_retries,
            rate_limit_backoff: Duration::from_secs(rate_limit_backoff_secs),
            backoff_cap: Duration::from_secs(backoff_cap_secs),
        })
    }

    /// One logical GET with bounded retries and backoff
    pub async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> FetchOutcome<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut last_failure: Option<FetchFailure> = None;

        for attempt in 0..self.max_retries {
            self.rate_limiter.acquire().await;

            debug!(url = %url, attempt = attempt + 1, "Making API request");

            let response = self.client.get(&url).query(query).send().await;

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_FOUND {
                        debug!(url = %url, "Resource not found");
                        return FetchOutcome::NotFound;
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let delay =
                            rate_limit_backoff(attempt, self.rate_limit_backoff, self.backoff_cap);
                        warn!(
                            url = %url,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis(),
                            "Rate limited by server, waiting"
                        );
                        last_failure = Some(FetchFailure::RateLimited {
                            attempts: attempt + 1,
                        });
                        sleep(delay).await;
                        continue;
                    }

                    if !status.is_success() {
                        let delay = transient_backoff(attempt);
                        warn!(
                            url = %url,
                            status = %status,
                            delay_ms = delay.as_millis(),
                            "Request failed, retrying"
                        );
                        last_failure = Some(FetchFailure::Http {
                            status: status.as_u16(),
                            attempts: attempt + 1,
                        });
                        sleep(delay).await;
                        continue;
                    }

                    match response.json::<T>().await {
                        Ok(data) => {
                            debug!(url = %url, "Request successful");
                            return FetchOutcome::Success(data);
                        }
                        Err(e) => {
                            let delay = transient_backoff(attempt);
                            warn!(url = %url, error = %e, "Failed to decode response, retrying");
                            last_failure = Some(FetchFailure::Decode {
                                message: e.to_string(),
                                attempts: attempt + 1,
                            });
                            sleep(delay).await;
                            continue;
                        }
                    }
                }
                Err(e) => {
                    let delay = transient_backoff(attempt);
                    warn!(url = %url, error = %e, "Request error, retrying");
                    last_failure = Some(FetchFailure::Transport {
                        message: e.to_string(),
                        attempts: attempt + 1,
                    });
                    sleep(delay).await;
                }
            }
        }

        let failure = last_failure.unwrap_or(FetchFailure::Transport {
            message: "no attempts made".to_string(),
            attempts: 0,
        });
        error!(url = %url, error = %failure, "Fetch failed after all retries");
        FetchOutcome::ExhaustedRetries(failure)
    }

    /// Fetch one page of completed TV anime, least popular last
    pub async fn get_anime_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> FetchOutcome<PaginatedResponse<AnimeListItem>> {
        self.fetch(
            "/anime",
            &[
                ("page", page.to_string()),
                ("limit", page_size.to_string()),
                ("order_by", "popularity".to_string()),
                ("sort", "asc".to_string()),
                ("status", "complete".to_string()),
                ("type", "tv".to_string()),
                ("min_score", "1".to_string()),
            ],
        )
        .await
    }

    /// Fetch full anime details by MAL ID
    pub async fn get_anime_full(&self, mal_id: u32) -> FetchOutcome<DataEnvelope<AnimeFull>> {
        self.fetch(&format!("/anime/{}/full", mal_id), &[]).await
    }

    /// Fetch anime details (without relations) by MAL ID
    pub async fn get_anime_details(&self, mal_id: u32) -> FetchOutcome<DataEnvelope<AnimeFull>> {
        self.fetch(&format!("/anime/{}", mal_id), &[]).await
    }

    /// Fetch the character cast of an anime
    pub async fn get_anime_characters(&self, mal_id: u32) -> FetchOutcome<DataList<CastEntry>> {
        self.fetch(&format!("/anime/{}/characters", mal_id), &[])
            .await
    }

    /// Fetch one page of characters ordered by favorites
    pub async fn get_character_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> FetchOutcome<PaginatedResponse<CharacterListItem>> {
        self.fetch(
            "/characters",
            &[
                ("page", page.to_string()),
                ("limit", page_size.to_string()),
                ("order_by", "favorites".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// Fetch full character details by MAL ID
    pub async fn get_character_full(
        &self,
        mal_id: u32,
    ) -> FetchOutcome<DataEnvelope<CharacterFull>> {
        self.fetch(&format!("/characters/{}/full", mal_id), &[])
            .await
    }

    /// Fetch one page of producers/studios ordered by anime count
    pub async fn get_producer_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> FetchOutcome<PaginatedResponse<ProducerListItem>> {
        self.fetch(
            "/producers",
            &[
                ("page", page.to_string()),
                ("limit", page_size.to_string()),
                ("order_by", "count".to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// Fetch full producer details by MAL ID
    pub async fn get_producer_full(&self, mal_id: u32) -> FetchOutcome<DataEnvelope<ProducerFull>> {
        self.fetch(&format!("/producers/{}/full", mal_id), &[])
            .await
    }

    /// Fetch all anime genres
    pub async fn get_anime_genres(&self) -> FetchOutcome<DataList<GenreItem>> {
        self.fetch("/genres/anime", &[]).await
    }

    /// Fetch all manga genres (some are relevant for anime too)
    pub async fn get_manga_genres(&self) -> FetchOutcome<DataList<GenreItem>> {
        self.fetch("/genres/manga", &[]).await
    }

    /// Search characters by name, best match first
    pub async fn search_characters(&self, query: &str) -> FetchOutcome<DataList<SearchHit>> {
        self.fetch(
            "/characters",
            &[("q", query.to_string()), ("limit", "1".to_string())],
        )
        .await
    }

    /// Search people by name, best match first
    pub async fn search_people(&self, query: &str) -> FetchOutcome<DataList<SearchHit>> {
        self.fetch(
            "/people",
            &[("q", query.to_string()), ("limit", "1".to_string())],
        )
        .await
    }

    /// Fetch full person details by MAL ID
    pub async fn get_person_full(&self, mal_id: u32) -> FetchOutcome<DataEnvelope<PersonFull>> {
        self.fetch(&format!("/people/{}/full", mal_id), &[]).await
    }

    /// Get the current per-minute request count
    pub fn rate_limit_stats(&self) -> usize {
        self.rate_limiter.current_minute_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = JikanClient::new(
            "https://api.jikan.moe/v4".to_string(),
            2.0,
            50,
            5,
            5,
            60,
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_rate_limit_backoff_doubles_until_capped() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);

        assert_eq!(rate_limit_backoff(0, base, cap), Duration::from_secs(5));
        assert_eq!(rate_limit_backoff(1, base, cap), Duration::from_secs(10));
        assert_eq!(rate_limit_backoff(2, base, cap), Duration::from_secs(20));
        assert_eq!(rate_limit_backoff(3, base, cap), Duration::from_secs(40));
        assert_eq!(rate_limit_backoff(4, base, cap), Duration::from_secs(60));
        assert_eq!(rate_limit_backoff(5, base, cap), Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_backoff_is_monotonic() {
        let base = Duration::from_secs(5);
        let cap = Duration::from_secs(60);

        let mut previous = Duration::ZERO;
        for attempt in 0..10 {
            let delay = rate_limit_backoff(attempt, base, cap);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_transient_backoff() {
        assert_eq!(transient_backoff(0), Duration::from_secs(1));
        assert_eq!(transient_backoff(1), Duration::from_secs(2));
        assert_eq!(transient_backoff(2), Duration::from_secs(4));
        assert_eq!(transient_backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_outcome_map() {
        let outcome = FetchOutcome::Success(2).map(|n| n * 3);
        assert!(matches!(outcome, FetchOutcome::Success(6)));

        let outcome: FetchOutcome<i32> = FetchOutcome::<i32>::NotFound.map(|n| n * 3);
        assert!(matches!(outcome, FetchOutcome::NotFound));
    }
}
