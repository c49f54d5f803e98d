//! Typed calls for each endpoint of the chart service.
//!
//! Inputs are validated here, before anything reaches the gateway. Endpoints
//! that need a login are refused locally while no valid session exists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use super::error::ApiError;
use super::gateway::{ApiGateway, RequestOptions};
use crate::auth::{AuthError, Authenticate, SessionManager};
use crate::models::{
    BirthData, ChartList, HealthStatus, LoginResponse, Pillars, RegisterRequest, RegisterResponse,
    SaveChartRequest, SaveChartResponse, SavedChart, UserSummary,
};
use crate::validate::{self, ValidationError};

#[async_trait]
impl Authenticate for ApiGateway {
    async fn authenticate(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.request_json(
            Method::POST,
            "/login",
            Some(json!({ "email": email, "password": password })),
            RequestOptions::public().with_fallback("Login failed"),
        )
        .await
    }
}

/// Endpoint service over a shared gateway. Clone is cheap.
#[derive(Clone)]
pub struct BaziApi {
    gateway: Arc<ApiGateway>,
}

impl BaziApi {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.gateway.session()
    }

    fn current_year(&self) -> i32 {
        self.session().now().year()
    }

    fn require_session(&self) -> Result<(), ApiError> {
        if self.session().is_authenticated() {
            Ok(())
        } else {
            Err(ValidationError::LoginRequired.into())
        }
    }

    // ===== Account =====

    pub async fn register(
        &self,
        nickname: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<UserSummary, ApiError> {
        let nickname = nickname.trim();
        let email = validate::normalize_email(email);
        validate::validate_nickname(nickname)?;
        validate::validate_email(&email)?;
        validate::validate_password(password)?;
        if password != confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }

        let body = RegisterRequest {
            nickname: nickname.to_string(),
            email,
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
        };
        let body = serde_json::to_value(&body).map_err(|e| ApiError::Unknown(e.to_string()))?;

        let response: RegisterResponse = self
            .gateway
            .request_json(
                Method::POST,
                "/register",
                Some(body),
                RequestOptions::public().with_fallback("Registration failed"),
            )
            .await?;

        info!(user_id = response.user.id, "Registration successful");
        Ok(response.user)
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserSummary>, AuthError> {
        self.session().login(self.gateway.as_ref(), email, password).await
    }

    pub fn logout(&self) {
        self.session().logout();
    }

    // ===== Charts =====

    /// Compute the four pillars for a birth date. No login needed.
    pub async fn calculate(&self, birth: &BirthData) -> Result<Pillars, ApiError> {
        validate::validate_birth(birth, self.current_year())?;

        let body = serde_json::to_value(birth).map_err(|e| ApiError::Unknown(e.to_string()))?;
        let pillars: Pillars = self
            .gateway
            .request_json(
                Method::POST,
                "/calculate",
                Some(body),
                RequestOptions::public().with_fallback("Calculation failed"),
            )
            .await?;

        debug!(%birth, %pillars, "Chart calculated");
        Ok(pillars)
    }

    pub async fn save_chart(
        &self,
        birth: &BirthData,
        pillars: &Pillars,
    ) -> Result<SaveChartResponse, ApiError> {
        self.require_session()?;
        validate::validate_birth(birth, self.current_year())?;

        let body = SaveChartRequest {
            birth: *birth,
            pillars: *pillars,
        };
        let body = serde_json::to_value(&body).map_err(|e| ApiError::Unknown(e.to_string()))?;

        let saved: SaveChartResponse = self
            .gateway
            .request_json(
                Method::POST,
                "/save_chart",
                Some(body),
                RequestOptions::authorized().with_fallback("Save failed"),
            )
            .await?;

        info!(chart_id = saved.chart_id, "Chart saved");
        Ok(saved)
    }

    /// Charts saved by the logged-in user, newest first
    pub async fn my_charts(&self) -> Result<Vec<SavedChart>, ApiError> {
        self.require_session()?;

        let list: ChartList = self
            .gateway
            .request_json(
                Method::GET,
                "/my_charts",
                None,
                RequestOptions::authorized().with_fallback("Could not load saved charts"),
            )
            .await?;
        Ok(list.data)
    }

    pub async fn delete_chart(&self, chart_id: i64) -> Result<(), ApiError> {
        self.require_session()?;

        self.gateway
            .request(
                Method::DELETE,
                &format!("/charts/{}", chart_id),
                None,
                RequestOptions::authorized().with_fallback("Delete failed"),
            )
            .await?;

        info!(chart_id, "Chart deleted");
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.gateway
            .request_json(
                Method::GET,
                "/health",
                None,
                RequestOptions::public().with_fallback("Service unavailable"),
            )
            .await
    }
}
