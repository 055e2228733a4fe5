//! Load-balancer configuration export.
//!
//! Renders one Traefik HTTP router per tenant so the edge forwards every
//! public hostname to this gateway.

use crate::tenants::types::Domain;

/// Router name for a host: dots become underscores.
pub fn router_name(host: &str) -> String {
    host.replace('.', "_")
}

/// Traefik dynamic configuration (YAML) routing every tenant to `service`.
pub fn traefik_config(domains: &[Domain], service: &str) -> String {
    let mut out = String::from("http:\n routers:\n");
    for d in domains {
        out.push_str(&format!(
            "  {}:\n   rule: Host(`{}`)\n   service: {}\n",
            router_name(&d.host_public),
            d.host_public,
            service
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traefik_config() {
        let domains = vec![
            Domain {
                host_public: "one.example.com".into(),
                ..Default::default()
            },
            Domain {
                host_public: "two.example".into(),
                ..Default::default()
            },
        ];
        let out = traefik_config(&domains, "cis-proxy@docker");
        assert_eq!(
            out,
            "http:\n routers:\n  one_example_com:\n   rule: Host(`one.example.com`)\n   service: cis-proxy@docker\n  two_example:\n   rule: Host(`two.example`)\n   service: cis-proxy@docker\n"
        );
    }

    #[test]
    fn test_empty_tenant_list() {
        assert_eq!(traefik_config(&[], "svc"), "http:\n routers:\n");
    }
}
