use aliri_braid::braid;
use cadfeed_saml::limited_reveal;

/// An OAuth token issued in exchange for a SAML assertion
#[braid(debug = "owned", display = "owned")]
pub struct OAuthToken;

limited_reveal!(OAuthTokenRef: "OAUTH TOKEN", 15);

/// The secret paired with an OAuth token, used to sign requests
#[braid(debug = "owned", display = "owned")]
pub struct OAuthTokenSecret;

limited_reveal!(OAuthTokenSecretRef: "OAUTH TOKEN SECRET", 5);
