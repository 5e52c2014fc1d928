use crate::core::race::Category;
use crate::core::status::EXPIRE_THRESHOLD_S;
use crate::pre::feed_opts::FeedOpts;
use crate::pre::read_feed_pars::FeedPars;
use anyhow::Context;
use helpers::general::InputValueError;

/// check_feed_opts_pars assures that the inserted options and parameters are within reasonable
/// limits and raises an error if not. Command line overrides must already be applied to the
/// parameters.
pub fn check_feed_opts_pars(feed_opts: &FeedOpts, feed_pars: &FeedPars) -> anyhow::Result<()> {
    // PART 1: FEED OPTIONS
    if feed_opts.page < 1 {
        return Err(InputValueError).context("page must be at least equal to one!");
    }

    if let Some(unknown) = feed_opts
        .categories
        .iter()
        .find(|c| Category::from_name_or_id(c).is_none())
    {
        return Err(InputValueError).context(format!(
            "category {} is neither a known category name nor id!",
            unknown
        ));
    }

    // PART 2: FEED PARAMETERS
    // BOARD ---------------------------------------------------------------------------------------
    let board_pars = &feed_pars.board_pars;

    if !(1..=100).contains(&board_pars.fetch_count) {
        return Err(InputValueError).context(format!(
            "fetch_count is {}, which is not within the reasonable range of [1, 100]!",
            board_pars.fetch_count
        ));
    }

    if !(1..=100).contains(&board_pars.page_size) {
        return Err(InputValueError).context(format!(
            "page_size is {}, which is not within the reasonable range of [1, 100]!",
            board_pars.page_size
        ));
    }

    // TIMING --------------------------------------------------------------------------------------
    let timing_pars = &feed_pars.timing_pars;

    if timing_pars.refresh_interval_ms == 0
        || timing_pars.expiration_check_interval_ms == 0
        || timing_pars.frequent_expiration_check_ms == 0
        || timing_pars.countdown_update_interval_ms == 0
    {
        return Err(InputValueError).context("All timer intervals must be greater than zero!");
    }

    if timing_pars.frequent_expiration_check_ms >= timing_pars.expiration_check_interval_ms {
        return Err(InputValueError).context(format!(
            "frequent_expiration_check_ms ({}) must be shorter than expiration_check_interval_ms \
            ({})!",
            timing_pars.frequent_expiration_check_ms, timing_pars.expiration_check_interval_ms
        ));
    }

    // a countdown can only trigger a sweep, eviction always waits for the expire threshold
    if timing_pars.remove_threshold_s < EXPIRE_THRESHOLD_S as u64 {
        return Err(InputValueError).context(format!(
            "remove_threshold_s is {}, but must not be below the expire threshold of {} s!",
            timing_pars.remove_threshold_s, EXPIRE_THRESHOLD_S
        ));
    }

    // API -----------------------------------------------------------------------------------------
    let api_pars = &feed_pars.api_pars;

    if api_pars.max_retries < 1 {
        return Err(InputValueError).context("max_retries must be at least equal to one!");
    }

    check_http_url(&api_pars.base_url).context("base_url is not a valid http(s) URL!")?;

    if let Some(proxy_url) = &api_pars.proxy_url {
        check_http_url(proxy_url).context("proxy_url is not a valid http(s) URL!")?;
    } else if feed_opts.use_proxy {
        return Err(InputValueError).context("use_proxy is set, but no proxy_url is configured!");
    }

    Ok(())
}

fn check_http_url(url: &str) -> anyhow::Result<()> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Failed to parse {}!", url))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(InputValueError).context(format!("{} is not an http(s) URL!", url));
    }
    Ok(())
}
