use crate::api::{attendance, balance, leave_request, password_reset, travel};
use crate::auth::middleware::auth_middleware;
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Context, Result};
use hr_ledger::config::Config;

type LimiterConfig = GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-IP limits, built once at startup so a bad rate fails fast.
#[derive(Clone)]
pub struct Limiters {
    reset: LimiterConfig,
    protected: LimiterConfig,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            reset: build_limiter(config.rate_reset_per_min).context("RATE_RESET_PER_MIN")?,
            protected: build_limiter(config.rate_protected_per_min)
                .context("RATE_PROTECTED_PER_MIN")?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<LimiterConfig> {
    if requests_per_min == 0 {
        anyhow::bail!("rate limit must be at least one request per minute");
    }
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .context("invalid rate limiter settings")
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/password-reset")
            .wrap(Governor::new(&limiters.reset))
            .service(web::resource("/request").route(web::post().to(password_reset::request_reset)))
            .service(web::resource("/confirm").route(web::post().to(password_reset::confirm_reset)))
            .service(
                web::resource("/validate/{token}")
                    .route(web::get().to(password_reset::validate_reset)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(Governor::new(&limiters.protected))
            .service(
                web::scope("/attendance")
                    .service(web::resource("/clock-in").route(web::post().to(attendance::clock_in)))
                    .service(web::resource("/clock-out").route(web::post().to(attendance::clock_out)))
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(attendance::history)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    // fixed segments before /{id}
                    .service(web::resource("/pending").route(web::get().to(leave_request::pending_leave)))
                    .service(web::resource("/types").route(web::get().to(leave_request::leave_types)))
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    )
                    .service(
                        web::resource("/{id}/cancel")
                            .route(web::put().to(leave_request::cancel_leave)),
                    ),
            )
            .service(
                web::scope("/travel")
                    .service(
                        web::resource("")
                            .route(web::get().to(travel::travel_list))
                            .route(web::post().to(travel::create_travel)),
                    )
                    .service(web::resource("/pending").route(web::get().to(travel::pending_travel)))
                    .service(web::resource("/{id}").route(web::get().to(travel::get_travel)))
                    .service(web::resource("/{id}/approve").route(web::put().to(travel::approve_travel)))
                    .service(web::resource("/{id}/reject").route(web::put().to(travel::reject_travel)))
                    .service(web::resource("/{id}/cancel").route(web::put().to(travel::cancel_travel)))
                    .service(
                        web::resource("/{id}/complete").route(web::put().to(travel::complete_travel)),
                    ),
            )
            .service(
                web::scope("/balance")
                    .service(web::resource("/reset").route(web::post().to(balance::reset_balance)))
                    .service(
                        web::resource("/{employee_id}").route(web::get().to(balance::list_balances)),
                    ),
            )
            .service(
                web::resource("/admin/reset-tokens/purge")
                    .route(web::post().to(password_reset::purge_tokens)),
            ),
    );
}
