//! Topic-keyed enforcement addenda.
//!
//! Hard output rules appended after the query block when the routed topics
//! call for a specific plan shape.

use flowplan_core::Topic;

pub const CONDITIONS_CONTRACT: &str = "\
CONDITIONS ENFORCEMENT (HARD RULES)

You MUST output a Markdown plan with these EXACT section headers:
## Trigger
## Start
## Steps
## Conditions
## End

- Under ## Trigger: EXACTLY one bullet, `- TRG_*`.
- Under ## Start: EXACTLY `- Start`. No condition checks here.
- Under ## End: EXACTLY `- End`.

If conditional logic is required:
1) In ## Steps output EXACTLY ONE line: `1. CNDN_BIN`, `1. CNDN_SEQ` or `1. CNDN_DOM`.
2) In ## Conditions output EXACTLY ONE matching subheader: `### CNDN_BIN`, `### CNDN_SEQ` or `### CNDN_DOM`.
3) Do NOT place any EVNT_* in ## Steps when Conditions are required.

CNDN_BIN FORMAT:
### CNDN_BIN
- IF TRUE:
  ↳ <EVNT_* ...>
- IF FALSE:
  ↳ <EVNT_* ...> OR Route to END

CNDN_SEQ FORMAT:
### CNDN_SEQ
- Logic Block 1:
  ↳ IF TRUE: <EVNT_* ...>
  ↳ IF FALSE: Route to END
- Logic Block 2:
  ↳ IF TRUE: <EVNT_* ...>
  ↳ IF FALSE: Route to END

CNDN_DOM FORMAT:
### CNDN_DOM
- Container 1:
  ↳ IF TRUE: <EVNT_* ...>
  ↳ IF FALSE: Route to Container 2
- Container 2:
  ↳ IF TRUE: <EVNT_* ...>
  ↳ IF FALSE: Route to END

If you violate any rule above, the output is invalid.";

pub const LOOPS_CONTRACT: &str = "\
LOOPS ENFORCEMENT (HARD RULES)

The \"loops\" topic was selected, so repetition is REQUIRED.

1) Include exactly one ## Loops section.
2) State the repetition count explicitly: \"N times\" or \"repeat N\" means `count: N`.
3) Inside ## Loops use bullets only, no numbered lines:
   - EVNT_LOOP_FOR (count: N)
     ↳ INSIDE LOOP: <EVNT_* ...>
4) NEVER place EVNT_LOOP_* or INSIDE LOOP lines inside ## Steps.
5) Do NOT repeat the looped action in ## Steps; omit ## Steps if nothing runs outside the loop.
6) Do NOT add \"Loop End\" or any loop closing step.

If you violate any rule above, your output is invalid.";

pub const STATIC_ONLY: &str = "\
META.STATIC_ONLY
- Use ONLY _STC events for static dimensions (roles/departments). Do NOT use dynamic EVNT_RCRD_*.";

pub const NOTIFICATION_ONLY: &str = "\
META.NOTIFICATION_ONLY
- Only EVNT_NOTI_* steps are allowed. Do NOT add EVNT_RCRD_* or EVNT_FLTR_*.";

/// Addenda for a routed topic list, in output order.
///
/// Static-only and notification-only requests never get the conditions
/// contract.
pub fn enforcement_addenda(topics: &[Topic]) -> Vec<&'static str> {
    let static_only = topics.contains(&Topic::StaticVsDynamic);
    let notification_only = topics == [Topic::NotificationsIntent];
    let conditions = topics.iter().any(|t| t.is_in_family_of(Topic::Conditions));

    let mut addenda = Vec::new();
    if topics.contains(&Topic::Loops) {
        addenda.push(LOOPS_CONTRACT);
    }
    if conditions && !static_only && !notification_only {
        addenda.push(CONDITIONS_CONTRACT);
    }
    if static_only {
        addenda.push(STATIC_ONLY);
    }
    if notification_only {
        addenda.push(NOTIFICATION_ONLY);
    }
    addenda
}
