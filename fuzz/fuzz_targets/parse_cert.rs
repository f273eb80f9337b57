#![no_main]

use libfuzzer_sys::fuzz_target;
use xchain_lib::{parse_cert, Chain};

fuzz_target!(|data: &[u8]| {
    // The parser must never panic, regardless of input.
    if let Ok(cert) = parse_cert(data) {
        let _ = cert.subject().to_oneline();
        let _ = cert.issuer().to_oneline();
        let _ = cert.serial_hex();
        let _ = cert.short_name();
        let _ = cert.basic_constraints();
        let _ = cert.key_usage();
        let _ = cert.is_self_issued();
        let _ = xchain_lib::der_to_pem(cert.der());

        // Summaries and JSON must cope with whatever the parser accepted.
        let chain = Chain::new(vec![cert]);
        let _ = chain.describe();
        let _ = serde_json::to_string(&chain);
    }
    let _ = xchain_lib::parse_pem_chain(data);
});
