pub mod check_feed_opts_pars;
pub mod feed_opts;
pub mod read_feed_pars;
