// Extraction des tokens d'une URL de callback OAuth

use url::Url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Extrait la paire access/refresh d'une URL de callback. Le fournisseur
/// peut livrer les tokens en query string ou en fragment selon le flux;
/// les deux formes sont acceptées. Un paramètre `error` l'emporte sur tout.
pub fn extract_tokens(callback_url: &str) -> Result<CallbackTokens, String> {
    let parsed = Url::parse(callback_url).map_err(|e| format!("invalid callback URL: {}", e))?;

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if let Some(fragment) = parsed.fragment() {
        params.extend(
            url::form_urlencoded::parse(fragment.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    let find = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    if find("error").is_some() || find("error_code").is_some() {
        let reason = find("error_description")
            .or_else(|| find("error"))
            .unwrap_or_else(|| "authentication error".to_string());
        return Err(reason);
    }

    match (find("access_token"), find("refresh_token")) {
        (Some(access_token), Some(refresh_token)) => Ok(CallbackTokens {
            access_token,
            refresh_token,
        }),
        _ => Err("no tokens in callback URL".to_string()),
    }
}
