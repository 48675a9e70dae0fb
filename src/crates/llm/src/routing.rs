//! Model selection: mapping a phase's routing profile to a concrete
//! model id.

use dag::{RoutingConfig, RoutingProfile};

/// A pure function of `profile`: `cheap`/`balanced`/`premium` resolve to
/// the matching field of `config`. The mapping itself is the contract;
/// the concrete model ids are configuration (see [`RoutingConfig`]).
pub fn resolve_model(profile: RoutingProfile, config: &RoutingConfig) -> String {
    match profile {
        RoutingProfile::Cheap => config.cheap_model.clone(),
        RoutingProfile::Balanced => config.balanced_model.clone(),
        RoutingProfile::Premium => config.premium_model.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_maps_each_profile() {
        let config = RoutingConfig {
            cheap_model: "cheap-1".into(),
            balanced_model: "balanced-1".into(),
            premium_model: "premium-1".into(),
        };
        assert_eq!(resolve_model(RoutingProfile::Cheap, &config), "cheap-1");
        assert_eq!(
            resolve_model(RoutingProfile::Balanced, &config),
            "balanced-1"
        );
        assert_eq!(resolve_model(RoutingProfile::Premium, &config), "premium-1");
    }
}
