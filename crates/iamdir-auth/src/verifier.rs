//! Web sign-in replay
//!
//! One form POST per attempt, on a fresh client with its own cookie jar and no
//! redirect following. The attempt succeeds iff the response sets both the
//! account-alias and the credentials cookie; the body is never read. This
//! depends on the provider's internal form and cookie names, which can change
//! without notice.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, error, instrument, warn};

use iamdir_core::{schema, Entry, IamDirError, Result};

use crate::config::SignInConfig;
use crate::secret::SignInSecret;

const CLIENT_ID: &str = "arn:aws:iam::015428540659:user/homepage";
const REDIRECT_URI: &str = "https://console.aws.amazon.com/console/home?state=hashArgs%23&isauthcode=true";
const MFA_TYPE: &str = "SW";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_3) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/64.0.3282.119 Safari/537.36";
const REFERER: &str = "https://us-east-1.signin.aws.amazon.com/oauth?client_id=arn%3Aaws%3Aiam%3A%3A015428540659%3Auser%2Fhomepage&redirect_uri=https%3A%2F%2Fconsole.aws.amazon.com%2Fconsole%2Fhome%3Fstate%3DhashArgs%2523%26isauthcode%3Dtrue&response_type=code&state=hashArgs%23";
const ORIGIN: &str = "https://us-east-1.signin.aws.amazon.com";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8";

/// Cookies the provider sets only on a successful sign-in
pub const ACCOUNT_ALIAS_COOKIE: &str = "aws-account-alias";
pub const CREDENTIALS_COOKIE: &str = "aws-creds";

/// Checks a presented secret for one account
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// `Ok(false)` for rejected credentials and for network failures; other
    /// faults, such as an unusable endpoint, are errors
    async fn verify(
        &self,
        account_number: &str,
        username: &str,
        secret: &SignInSecret,
    ) -> Result<bool>;
}

pub struct WebSignInVerifier {
    config: SignInConfig,
}

impl WebSignInVerifier {
    pub fn new(config: SignInConfig) -> Self {
        Self { config }
    }

    /// Verify a raw presented secret against a mirrored user entry.
    ///
    /// The entry must carry `uid` and `accountNumber`.
    pub async fn verify_entry(&self, entry: &Entry, presented: &str) -> Result<bool> {
        let username = entry.first(schema::UID).ok_or_else(|| {
            IamDirError::auth_error(format!("{} has no {}", entry.path(), schema::UID))
        })?;
        let account_number = entry.first(schema::ACCOUNT_NUMBER).ok_or_else(|| {
            IamDirError::auth_error(format!("{} has no {}", entry.path(), schema::ACCOUNT_NUMBER))
        })?;

        self.verify(account_number, username, &SignInSecret::parse(presented))
            .await
    }

    fn client(&self) -> Result<Client> {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .timeout(self.config.timeout())
            .default_headers(browser_headers())
            .build()
            .map_err(|e| IamDirError::internal_error(format!("building sign-in client: {}", e)))
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
    headers.insert("Referer", HeaderValue::from_static(REFERER));
    headers.insert("Origin", HeaderValue::from_static(ORIGIN));
    headers.insert("Accept-Encoding", HeaderValue::from_static("gzip, deflate, br"));
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        "Content-Type",
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert("Accept", HeaderValue::from_static(ACCEPT));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

fn sign_in_form<'a>(
    account_number: &'a str,
    username: &'a str,
    secret: &'a SignInSecret,
) -> [(&'static str, &'a str); 14] {
    [
        ("client_id", CLIENT_ID),
        ("isIAMUser", "1"),
        ("account", account_number),
        ("username", username),
        ("password", secret.password()),
        ("Action", "login"),
        ("redirect_uri", REDIRECT_URI),
        ("forceMobileApp", ""),
        ("forceMobileLayout", ""),
        ("mfaLoginFailure", ""),
        ("RemainingExpiryPeriod", ""),
        ("mfaType", MFA_TYPE),
        ("mfacode", secret.mfa_code()),
        ("next_mfacode", ""),
    ]
}

/// Name of a `Set-Cookie` value, if it has a non-empty value
fn cookie_name(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || value.trim().is_empty() {
        return None;
    }
    Some(name)
}

/// True when both session cookies are among the `Set-Cookie` headers
pub(crate) fn has_session_cookies(headers: &HeaderMap) -> bool {
    let names: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(cookie_name)
        .collect();
    names.contains(&ACCOUNT_ALIAS_COOKIE) && names.contains(&CREDENTIALS_COOKIE)
}

#[async_trait]
impl CredentialVerifier for WebSignInVerifier {
    #[instrument(skip(self, secret), fields(endpoint = %self.config.endpoint))]
    async fn verify(
        &self,
        account_number: &str,
        username: &str,
        secret: &SignInSecret,
    ) -> Result<bool> {
        let client = self.client()?;
        let form = sign_in_form(account_number, username, secret);

        let response = match client.post(&self.config.endpoint).form(&form).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Err(IamDirError::config_error(format!(
                    "invalid sign-in endpoint {}: {}",
                    self.config.endpoint, e
                )));
            }
            Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                error!("Exception validating password for {}: {}", username, e);
                return Ok(false);
            }
            Err(e) => {
                return Err(IamDirError::internal_error(format!("sign-in request failed: {}", e)));
            }
        };

        let accepted = has_session_cookies(response.headers());
        if accepted {
            debug!(status = %response.status(), "Sign-in accepted");
        } else {
            warn!(status = %response.status(), "Sign-in rejected");
        }
        Ok(accepted)
    }
}
