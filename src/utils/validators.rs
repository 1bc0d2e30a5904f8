use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use url::Url;

/// Validate that a string is a valid URL with http or https scheme
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| anyhow!("Invalid URL format: {}", e))?;

    // Only allow http and https schemes
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!(
            "URL must use http or https scheme, got: {}",
            url.scheme()
        ));
    }

    // Must have a host
    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a host"));
    }

    Ok(url)
}

/// Validate username (alphanumeric, hyphens, underscores, 1-39 chars for GitHub compatibility)
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > 39 {
        return Err(anyhow!(
            "Username must be between 1 and 39 characters"
        ));
    }

    // Allow alphanumeric, hyphens, and underscores
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "Username can only contain alphanumeric characters, hyphens, and underscores"
        ));
    }

    Ok(())
}

/// Validate a reminder time: zero-padded 24h "HH:MM", the exact form the
/// scheduler renders the current minute into.
pub fn validate_reminder_time(time: &str) -> Result<()> {
    let (hh, mm) = time
        .split_once(':')
        .ok_or_else(|| anyhow!("Reminder time must be HH:MM, got '{}'", time))?;

    if hh.len() != 2 || mm.len() != 2 {
        return Err(anyhow!("Reminder time must be zero-padded HH:MM, got '{}'", time));
    }

    let hour: u32 = hh
        .parse()
        .map_err(|_| anyhow!("Invalid hour in reminder time '{}'", time))?;
    let minute: u32 = mm
        .parse()
        .map_err(|_| anyhow!("Invalid minute in reminder time '{}'", time))?;

    if hour > 23 || minute > 59 {
        return Err(anyhow!("Reminder time out of range: '{}'", time));
    }

    Ok(())
}

/// Validate an IANA timezone name, e.g. "America/New_York".
pub fn validate_timezone(timezone: &str) -> Result<Tz> {
    timezone
        .parse()
        .map_err(|_| anyhow!("Unknown timezone '{}'", timezone))
}
