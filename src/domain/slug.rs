//! Slug generation for group addresses.
//!
//! Titles are transliterated and slugified by the `slug` crate, so Cyrillic
//! titles such as "Лев Толстой" become `lev-tolstoi`. Uniqueness is delegated
//! to a caller-supplied predicate so the logic stays free of persistence.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Produce a slug that does not collide according to the async predicate.
///
/// `is_unique` must resolve to `true` when the candidate is free. Collisions
/// are retried with a numeric suffix (`-2`, `-3`, ...).
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<String, SlugAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(&base).await.map_err(SlugAsyncError::Predicate)? {
        return Ok(base);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_unique(&candidate)
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn derives_ascii_slug() {
        assert_eq!(derive_slug("Rust Lovers").expect("slug"), "rust-lovers");
    }

    #[test]
    fn transliterates_cyrillic() {
        let slug = derive_slug("Лев Толстой").expect("slug");
        assert!(slug.is_ascii());
        assert!(slug.starts_with("lev-"));
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn rejects_symbol_only_input() {
        assert!(matches!(
            derive_slug("!!!"),
            Err(SlugError::Unrepresentable { .. })
        ));
    }

    #[tokio::test]
    async fn suffixes_taken_slugs() {
        let taken: HashSet<&str> = ["cats", "cats-2"].into_iter().collect();
        let slug = generate_unique_slug_async("Cats", |candidate| {
            let free = !taken.contains(candidate);
            async move { Ok::<_, Infallible>(free) }
        })
        .await
        .expect("unique slug");
        assert_eq!(slug, "cats-3");
    }
}
