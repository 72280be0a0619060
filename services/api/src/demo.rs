use crate::infra::{parse_seed_user, seed_users};
use clap::Args;
use listing_review::config::ListingConfig;
use listing_review::error::AppError;
use listing_review::listings::{
    AccessLogQuery, Actor, InMemoryEntityStore, ListingService, PropertyAttributes,
    PropertyDraft, PropertyPatch, PropertyQuery, PropertyStatus, PropertyType, RequestContext,
    UserDeletePolicy, UserId,
};
use std::sync::Arc;

const DEMO_AGENT: &str = "demo-agent";
const DEMO_RIVAL: &str = "rival-agent";
const DEMO_ADMIN: &str = "demo-admin";

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Asking price for the demo listing.
    #[arg(long, default_value_t = 325_000.0)]
    pub(crate) price: f64,
    /// Reason the reviewer gives when rejecting the first submission.
    #[arg(long, default_value = "Photos are too dark to evaluate the interior")]
    pub(crate) reject_reason: String,
    /// Delete the agent at the end of the walk-through (`retain` or `cascade`).
    #[arg(long, value_parser = parse_policy)]
    pub(crate) delete_agent: Option<UserDeletePolicy>,
}

fn parse_policy(raw: &str) -> Result<UserDeletePolicy, String> {
    UserDeletePolicy::parse(raw).ok_or_else(|| format!("unknown delete policy '{raw}'"))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        price,
        reject_reason,
        delete_agent,
    } = args;

    let store = Arc::new(InMemoryEntityStore::new());
    let seeds = [
        parse_seed_user(DEMO_AGENT).map_err(seed_error)?,
        parse_seed_user(DEMO_RIVAL).map_err(seed_error)?,
        parse_seed_user(&format!("{DEMO_ADMIN}:admin")).map_err(seed_error)?,
    ];
    seed_users(store.as_ref(), &seeds)?;

    let config = ListingConfig {
        user_delete_policy: delete_agent.unwrap_or_default(),
        ..ListingConfig::default()
    };
    let service = ListingService::new(store.clone(), store.clone(), config);

    let agent = context(&service, DEMO_AGENT)?;
    let rival = context(&service, DEMO_RIVAL)?;
    let admin = context(&service, DEMO_ADMIN)?;

    println!("Listing review demo");
    let listing = service.create_property(&agent, demo_draft(price))?;
    println!(
        "- {} created '{}' at ${:.0} -> {}",
        agent.actor.id, listing.title, listing.price, listing.status
    );

    let listing = service.transition_property(
        &agent,
        &listing.id,
        PropertyStatus::PendingApproval,
        None,
    )?;
    println!("- submitted for review -> {}", listing.status);

    match service.transition_property(&rival, &listing.id, PropertyStatus::Active, None) {
        Ok(_) => println!("- unexpected: {} approved a listing", rival.actor.id),
        Err(err) => println!("- {} tried to approve: {}", rival.actor.id, err),
    }

    let listing = service.transition_property(
        &admin,
        &listing.id,
        PropertyStatus::Rejected,
        Some(&reject_reason),
    )?;
    println!(
        "- {} rejected it: {}",
        admin.actor.id,
        listing.rejection_reason.as_deref().unwrap_or("-")
    );

    let owner_view = service.list_properties(&agent, &PropertyQuery::mine())?;
    let rival_view = service.list_properties(&rival, &PropertyQuery::default())?;
    println!(
        "  owner sees {} listing(s), another agent sees {}",
        owner_view.len(),
        rival_view.len()
    );

    let listing = service.update_property(
        &agent,
        &listing.id,
        PropertyPatch {
            images: Some(vec![
                "https://cdn.example.com/demo/living-room-daylight.jpg".to_string(),
                "https://cdn.example.com/demo/kitchen-daylight.jpg".to_string(),
            ]),
            ..PropertyPatch::default()
        },
    )?;
    println!("- owner replaced photos ({} images)", listing.images.len());

    let listing = service.transition_property(
        &agent,
        &listing.id,
        PropertyStatus::PendingApproval,
        None,
    )?;
    let listing =
        service.transition_property(&admin, &listing.id, PropertyStatus::Active, None)?;
    println!("- resubmitted and approved -> {}", listing.status);

    let listing = service.transition_property(&agent, &listing.id, PropertyStatus::Sold, None)?;
    println!("- marked sold -> {}", listing.status);

    let stats = service.dashboard(&agent)?;
    println!(
        "\nDashboard for {}: {} total | {} active | {} sold",
        agent.actor.id, stats.total, stats.active, stats.sold
    );

    if let Some(policy) = delete_agent {
        service.delete_user(&admin, &agent.actor.id)?;
        println!(
            "- deleted {} with '{}' policy; {} listing(s) remain",
            agent.actor.id,
            policy.label(),
            store.property_count()
        );
    }

    println!("\nAccess log (newest first)");
    for entry in service.list_access_logs(&admin, &AccessLogQuery::default())? {
        println!(
            "  {} {:<20} {:?} by {}",
            entry.created_at.format("%H:%M:%S%.3f"),
            entry.action,
            entry.outcome,
            entry
                .user_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}

fn context(
    service: &ListingService<InMemoryEntityStore, InMemoryEntityStore>,
    id: &str,
) -> Result<RequestContext, AppError> {
    let actor: Actor = service.resolve_actor(&UserId(id.to_string()))?;
    Ok(RequestContext::new(actor).with_origin("127.0.0.1"))
}

fn seed_error(message: String) -> AppError {
    AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, message))
}

fn demo_draft(price: f64) -> PropertyDraft {
    PropertyDraft {
        title: "Mid-century ranch with mountain views".to_string(),
        description: Some("Single-level living on a quiet cul-de-sac.".to_string()),
        address: "1820 Aspen Court".to_string(),
        city: Some("Boulder".to_string()),
        state: Some("CO".to_string()),
        zip_code: Some("80304".to_string()),
        price,
        property_type: PropertyType::House,
        attributes: PropertyAttributes {
            bedrooms: Some(3.0),
            bathrooms: Some(2.0),
            floor_area: Some(1_850.0),
            lot_size: Some(8_200.0),
        },
        images: vec!["https://cdn.example.com/demo/living-room.jpg".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_walk_completes_with_each_policy() {
        for delete_agent in [
            None,
            Some(UserDeletePolicy::RetainListings),
            Some(UserDeletePolicy::CascadeListings),
        ] {
            let args = DemoArgs {
                price: 250_000.0,
                reject_reason: "Needs a floor plan".to_string(),
                delete_agent,
            };
            run_demo(args).expect("demo runs");
        }
    }

    #[test]
    fn parse_policy_rejects_unknown_values() {
        assert_eq!(parse_policy("cascade"), Ok(UserDeletePolicy::CascadeListings));
        assert!(parse_policy("archive").is_err());
    }
}
