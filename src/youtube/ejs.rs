//! Signature and `n` throttling-parameter solving through the player script.

use std::collections::HashMap;
use url::Url;
use ytdlp_ejs::{
    JsChallengeInput, JsChallengeOutput, JsChallengeRequest, JsChallengeResponse, JsChallengeType,
    RuntimeType,
};

use crate::error::{Result, TuneGrabError};
use crate::youtube::types::Format;

#[cfg(feature = "qjs")]
const RUNTIME: RuntimeType = RuntimeType::QuickJS;
#[cfg(all(not(feature = "qjs"), feature = "boa"))]
const RUNTIME: RuntimeType = RuntimeType::Boa;

/// Fields of a `signatureCipher` query string
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Cipher {
    pub url: String,
    pub sp: String,
    pub s: String,
}

pub(crate) fn parse_cipher(cipher: &str) -> Result<Cipher> {
    let mut params: HashMap<String, String> = url::form_urlencoded::parse(cipher.as_bytes())
        .into_owned()
        .collect();
    let missing = |field: &str| TuneGrabError::CipherParseError(format!("Missing {} in cipher", field));
    Ok(Cipher {
        url: params.remove("url").ok_or_else(|| missing("url"))?,
        sp: params.remove("sp").unwrap_or_else(|| "sig".to_string()),
        s: params.remove("s").ok_or_else(|| missing("s"))?,
    })
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Replace query parameters, keeping the order of the others
pub(crate) fn replace_query(mut url: Url, replacements: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !replacements.iter().any(|(r, _)| r == k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.extend(replacements.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

fn run_challenges(
    player: String,
    challenges: Vec<(JsChallengeType, String)>,
) -> Result<HashMap<String, String>> {
    let requests = challenges
        .into_iter()
        .map(|(challenge_type, value)| JsChallengeRequest {
            challenge_type,
            challenges: vec![value],
        })
        .collect();
    let input = JsChallengeInput::Player {
        player,
        requests,
        output_preprocessed: false,
    };

    match ytdlp_ejs::process_input(input, RUNTIME) {
        JsChallengeOutput::Result { responses, .. } => Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                JsChallengeResponse::Result { data } => Some(data),
                _ => None,
            })
            .flatten()
            .collect()),
        JsChallengeOutput::Error { error } => Err(TuneGrabError::JsDecryptionFailed(format!(
            "JS execution failed: {}",
            error
        ))),
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| TuneGrabError::CipherParseError(format!("Failed to parse URL: {}", e)))
}

fn solved(results: &HashMap<String, String>, input: &str, what: &str) -> Result<String> {
    results
        .get(input)
        .cloned()
        .ok_or_else(|| TuneGrabError::JsDecryptionFailed(format!("no answer for {}", what)))
}

/// Playable URL of a format: the `n` parameter is always rewritten, and a
/// ciphered format also gets its signature solved.
pub fn resolve_url(format: &Format, player: String) -> Result<String> {
    if let Some(url) = &format.url {
        let url = parse_url(url)?;
        let Some(n) = query_param(&url, "n") else {
            return Ok(url.to_string());
        };
        let results = run_challenges(player, vec![(JsChallengeType::N, n.clone())])?;
        let new_n = solved(&results, &n, "n")?;
        return Ok(replace_query(url, &[("n", &new_n)]));
    }

    let cipher = format
        .signature_cipher
        .as_deref()
        .ok_or(TuneGrabError::AudioNotFound)?;
    let cipher = parse_cipher(cipher)?;
    let url = parse_url(&cipher.url)?;
    let n = query_param(&url, "n");

    let mut challenges = vec![(JsChallengeType::Sig, cipher.s.clone())];
    if let Some(n) = &n {
        challenges.push((JsChallengeType::N, n.clone()));
    }
    let results = run_challenges(player, challenges)?;

    let sig = solved(&results, &cipher.s, "signature")?;
    let new_n = n.as_deref().map(|n| solved(&results, n, "n")).transpose()?;
    let mut replacements = vec![(cipher.sp.as_str(), sig.as_str())];
    if let Some(new_n) = &new_n {
        replacements.push(("n", new_n.as_str()));
    }
    Ok(replace_query(url, &replacements))
}
