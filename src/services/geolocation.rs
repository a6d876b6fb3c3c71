use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{error::GeoError, models::response::ResponseContext};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub country: String,
    pub state: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: String,
    pub ip: String,
    pub country_code: String,
    pub region_code: String,
}

impl GeoLocation {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            latitude: None,
            longitude: None,
            timezone: UNKNOWN.to_string(),
            ip: UNKNOWN.to_string(),
            country_code: UNKNOWN.to_string(),
            region_code: UNKNOWN.to_string(),
        }
    }

    pub fn into_context(self, user_agent: Option<String>, language: Option<String>) -> ResponseContext {
        ResponseContext {
            user_country: Some(self.country),
            user_state: Some(self.state),
            user_city: Some(self.city),
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: Some(self.timezone),
            ip: Some(self.ip),
            country_code: Some(self.country_code),
            region_code: Some(self.region_code),
            user_agent,
            language,
        }
    }
}

/// What the voter's request tells us about where it came from.
#[derive(Debug, Clone, Default)]
pub struct LocationHint {
    pub ip: Option<String>,
    pub timezone: Option<String>,
}

impl LocationHint {
    /// The voter's address, if it is one the public lookup services can place.
    pub fn public_ip(&self) -> Option<IpAddr> {
        let ip: IpAddr = self.ip.as_deref()?.trim().parse().ok()?;
        let local = match ip {
            IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
        };
        (!local).then_some(ip)
    }
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn locate(&self, hint: &LocationHint) -> Result<GeoLocation, GeoError>;
}

/// Never fails: falls back to the timezone table when the provider gives up.
/// The provider is only asked when the voter has a public address.
pub async fn resolve_location(
    provider: Option<&dyn LocationProvider>,
    hint: &LocationHint,
) -> GeoLocation {
    if let Some(provider) = provider {
        if hint.public_ip().is_none() {
            debug!(ip = ?hint.ip, "no public client address, using timezone fallback");
            return timezone_fallback(hint.timezone.as_deref());
        }
        match provider.locate(hint).await {
            Ok(location) => return location,
            Err(e) => warn!(error = %e, "using timezone fallback"),
        }
    }
    timezone_fallback(hint.timezone.as_deref())
}

#[derive(Debug, Clone, Copy)]
enum IpService {
    IpApiCo,
    IpInfo,
    IpApiCom,
}

impl IpService {
    const ALL: [IpService; 3] = [IpService::IpApiCo, IpService::IpInfo, IpService::IpApiCom];

    fn url(self, ip: IpAddr) -> String {
        match self {
            IpService::IpApiCo => format!("https://ipapi.co/{ip}/json/"),
            IpService::IpInfo => format!("https://ipinfo.io/{ip}/json"),
            IpService::IpApiCom => format!("http://ip-api.com/json/{ip}"),
        }
    }

    fn parse(self, data: &Value) -> GeoLocation {
        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN)
                .to_string()
        };
        let number = |key: &str| data.get(key).and_then(Value::as_f64);

        let mut location = match self {
            IpService::IpApiCo => GeoLocation {
                country: text("country_name"),
                state: data
                    .get("region")
                    .or_else(|| data.get("state"))
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN)
                    .to_string(),
                city: text("city"),
                latitude: number("latitude"),
                longitude: number("longitude"),
                timezone: text("timezone"),
                ip: text("ip"),
                country_code: text("country_code"),
                region_code: text("region_code"),
            },
            IpService::IpInfo => {
                let (latitude, longitude) = data
                    .get("loc")
                    .and_then(Value::as_str)
                    .and_then(|loc| loc.split_once(','))
                    .map(|(lat, lon)| (lat.trim().parse().ok(), lon.trim().parse().ok()))
                    .unwrap_or((None, None));
                GeoLocation {
                    country: text("country"),
                    state: text("region"),
                    city: text("city"),
                    latitude,
                    longitude,
                    timezone: text("timezone"),
                    ip: text("ip"),
                    country_code: text("country"),
                    region_code: text("region"),
                }
            }
            IpService::IpApiCom => GeoLocation {
                country: text("country"),
                state: text("regionName"),
                city: text("city"),
                latitude: number("lat"),
                longitude: number("lon"),
                timezone: text("timezone"),
                ip: text("query"),
                country_code: text("countryCode"),
                region_code: text("region"),
            },
        };
        location.country = standardize_country_name(&location.country);
        location
    }
}

/// Tries the public IP geolocation services in order until one answers.
pub struct IpGeolocationProvider {
    client: Client,
}

impl IpGeolocationProvider {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LocationProvider for IpGeolocationProvider {
    async fn locate(&self, hint: &LocationHint) -> Result<GeoLocation, GeoError> {
        let ip = hint.public_ip().ok_or(GeoError::GeolocationUnavailable)?;
        for service in IpService::ALL {
            let url = service.url(ip);
            let attempt = async {
                let res = self
                    .client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<Value, reqwest::Error>(res.json::<Value>().await?)
            };
            match attempt.await {
                Ok(data) => {
                    debug!(%url, "location service answered");
                    return Ok(service.parse(&data));
                }
                Err(e) => debug!(%url, error = %e, "location service failed"),
            }
        }
        Err(GeoError::GeolocationUnavailable)
    }
}

const TIMEZONE_REGIONS: &[(&str, &str, &str)] = &[
    ("Asia/Kathmandu", "Nepal", "Bagmati"),
    ("America/New_York", "United States", "New York"),
    ("America/Chicago", "United States", "Illinois"),
    ("America/Denver", "United States", "Colorado"),
    ("America/Los_Angeles", "United States", "California"),
    ("Europe/London", "United Kingdom", "England"),
    ("Europe/Berlin", "Germany", "Berlin"),
    ("Asia/Tokyo", "Japan", "Tokyo"),
    ("Australia/", "Australia", "New South Wales"),
    ("Asia/Kolkata", "India", "Delhi"),
    ("America/Toronto", "Canada", "Ontario"),
];

/// Maps an IANA timezone name to a coarse (country, state) guess.
pub fn timezone_fallback(timezone: Option<&str>) -> GeoLocation {
    let mut location = GeoLocation::unknown();
    let Some(name) = timezone.and_then(|tz| tz.parse::<Tz>().ok()).map(|tz| tz.name()) else {
        return location;
    };

    location.timezone = name.to_string();
    if let Some((_, country, state)) = TIMEZONE_REGIONS
        .iter()
        .find(|(prefix, _, _)| name.contains(prefix))
    {
        location.country = country.to_string();
        location.state = state.to_string();
    }
    location
}

const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("USA", "United States"),
    ("United States of America", "United States"),
    ("UK", "United Kingdom"),
    ("GB", "United Kingdom"),
    ("Great Britain", "United Kingdom"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("NL", "Netherlands"),
    ("SE", "Sweden"),
    ("NO", "Norway"),
    ("DK", "Denmark"),
    ("FI", "Finland"),
    ("PL", "Poland"),
    ("CZ", "Czech Republic"),
    ("HU", "Hungary"),
    ("RO", "Romania"),
    ("BG", "Bulgaria"),
    ("GR", "Greece"),
    ("TR", "Turkey"),
    ("RU", "Russia"),
    ("CN", "China"),
    ("KR", "South Korea"),
    ("TH", "Thailand"),
    ("SG", "Singapore"),
    ("MY", "Malaysia"),
    ("ID", "Indonesia"),
    ("PH", "Philippines"),
    ("VN", "Vietnam"),
    ("TW", "Taiwan"),
    ("HK", "Hong Kong"),
    ("NZ", "New Zealand"),
    ("MX", "Mexico"),
    ("AR", "Argentina"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("PE", "Peru"),
    ("VE", "Venezuela"),
    ("BR", "Brazil"),
    ("AU", "Australia"),
    ("CA", "Canada"),
    ("ZA", "South Africa"),
    ("IN", "India"),
    ("JP", "Japan"),
    ("NP", "Nepal"),
];

pub fn standardize_country_name(name: &str) -> String {
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, display)| *display)
        .to_string()
}
