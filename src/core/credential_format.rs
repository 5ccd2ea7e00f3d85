use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const FORMAT_MSO_MDOC: &str = "mso_mdoc";
const FORMAT_SD_JWT_VC: &str = "dc+sd-jwt";
const FORMAT_SD_JWT_VC_LEGACY: &str = "vc+sd-jwt";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_LDP_VC: &str = "ldp_vc";

/// The credential formats a DCQL query can address.
///
/// Format identifiers follow OID4VP v1.0 Appendix B. The legacy `vc+sd-jwt`
/// identifier is accepted on input and normalized to `dc+sd-jwt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialFormat {
    /// ISO/IEC 18013-5 mobile documents (mDL, etc.), claims addressed by
    /// `(namespace, element identifier)` pairs.
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,
    /// IETF SD-JWT Verifiable Credentials.
    #[serde(rename = "dc+sd-jwt", alias = "vc+sd-jwt")]
    SdJwtVc,
    /// W3C Verifiable Credentials secured with JWT.
    #[serde(rename = "jwt_vc_json")]
    JwtVcJson,
    /// W3C Verifiable Credentials with Linked Data Proofs.
    #[serde(rename = "ldp_vc")]
    LdpVc,
}

impl CredentialFormat {
    /// Returns `true` if both formats use the W3C VC data model for claim
    /// matching.
    pub fn is_w3c_vc(&self) -> bool {
        matches!(self, Self::JwtVcJson | Self::LdpVc)
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::MsoMdoc => FORMAT_MSO_MDOC,
            Self::SdJwtVc => FORMAT_SD_JWT_VC,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::LdpVc => FORMAT_LDP_VC,
        };
        f.write_str(s)
    }
}

impl FromStr for CredentialFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FORMAT_MSO_MDOC => Ok(Self::MsoMdoc),
            FORMAT_SD_JWT_VC | FORMAT_SD_JWT_VC_LEGACY => Ok(Self::SdJwtVc),
            FORMAT_JWT_VC_JSON => Ok(Self::JwtVcJson),
            FORMAT_LDP_VC => Ok(Self::LdpVc),
            other => anyhow::bail!("unknown credential format: {other}"),
        }
    }
}
