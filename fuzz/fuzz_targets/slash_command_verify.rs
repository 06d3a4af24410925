#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use relay_core::{AppRegistration, AppRegistry};
use relay_receiver::{
    compute_request_signature, event_type_for_command, form_value, SignatureVerifier,
    SignedRequest, SlashCommand,
};

fuzz_target!(|data: &[u8]| {
    let command = SlashCommand::from_form_body(data);
    let app_id = form_value(data, "api_app_id").unwrap_or_default();
    assert_eq!(command.api_app_id, app_id);
    let event_type = event_type_for_command(command.command.as_str());
    assert!(command.command.ends_with(event_type));

    let Ok(registry) = AppRegistry::from_registrations(vec![AppRegistration {
        app_id: "fuzz-app".to_string(),
        signing_secret: "fuzz-secret".to_string(),
        api_token: "xoxb-fuzz".to_string(),
    }]) else {
        return;
    };
    let verifier = SignatureVerifier::new(Arc::new(registry));
    let raw = String::from_utf8_lossy(data);
    let forged = verifier.verify(&SignedRequest {
        body: data,
        timestamp: "1700000000",
        signature: raw.as_ref(),
        app_id: "fuzz-app",
    });
    assert!(forged.is_err());

    if let Some(signature) = compute_request_signature("fuzz-secret", "1700000000", data) {
        let genuine = verifier.verify(&SignedRequest {
            body: data,
            timestamp: "1700000000",
            signature: signature.as_str(),
            app_id: "fuzz-app",
        });
        assert_eq!(genuine.is_ok(), !data.is_empty());
    }
});
