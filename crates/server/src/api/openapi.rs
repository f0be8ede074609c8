//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, ClientCredentials, Flow, HttpAuthScheme, HttpBuilder, Implicit, OAuth2,
        Password, Scopes, SecurityScheme,
    },
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .description(Some(
                    "Opaque access token issued by the `/token` endpoint.",
                ))
                .build();
            components.add_security_scheme("Bearer", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([
                Flow::AuthorizationCode(AuthorizationCode::new(
                    "/authorize",
                    "/token",
                    Scopes::new(),
                )),
                Flow::Implicit(Implicit::new("/authorize", Scopes::new())),
                Flow::Password(Password::new("/token", Scopes::new())),
                Flow::ClientCredentials(ClientCredentials::new("/token", Scopes::new())),
            ]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "OAuth2 Authorization Server",
        version = "1.0.0",
        description = "Issues authorization codes, access tokens and refresh tokens to registered clients."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 protocol endpoints")
    )
)]
pub struct ApiDoc;
