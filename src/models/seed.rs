// Initial control-room state: the three monitored Chennai junctions and the
// incidents open at start of shift.

use chrono::{DateTime, Local, NaiveTime};

use crate::models::incident::{Incident, IncidentDetails, Priority};
use crate::models::junction::{JunctionState, Phase};

pub fn create_junctions() -> Vec<JunctionState> {
    vec![
        JunctionState::new(
            "anna-salai-mount",
            "Anna Salai - Mount Road",
            13.0827,
            80.2707,
            85.0,
            12,
            95.0,
            Phase::NsGreen,
            28,
            120,
        ),
        JunctionState::new(
            "omr-sholinganallur",
            "OMR - Sholinganallur",
            12.9010,
            80.2279,
            62.0,
            8,
            45.0,
            Phase::EwGreen,
            15,
            90,
        )
        .with_detection(true, false),
        JunctionState::new(
            "ecr-mahabalipuram",
            "ECR - Mahabalipuram Rd",
            12.8340,
            80.2880,
            34.0,
            4,
            22.0,
            Phase::NsRed,
            8,
            100,
        )
        .with_detection(false, true),
    ]
}

pub fn create_incidents() -> Vec<Incident> {
    vec![
        Incident::new(
            1,
            "OMR Junction",
            "Ambulance approaching from south",
            today_at(14, 23),
            Priority::High,
            IncidentDetails::Emergency {
                vehicle_type: "Ambulance".to_string(),
                direction: "South to North".to_string(),
                eta: "2 min".to_string(),
            },
            &[
                "Clear traffic signal",
                "Alert nearby junctions",
                "Contact emergency services",
            ],
        )
        .with_description("Emergency vehicle detected via OpenCV. Estimated arrival: 2 minutes."),
        Incident::new(
            2,
            "ECR Junction",
            "Minor collision detected",
            today_at(14, 20),
            Priority::Medium,
            IncidentDetails::Accident {
                severity: "Minor".to_string(),
                vehicles_involved: 2,
                injuries: "None reported".to_string(),
            },
            &[
                "Dispatch traffic police",
                "Contact nearest hospital",
                "Redirect traffic",
                "Clear debris",
            ],
        )
        .with_description("OpenCV detected sudden stop pattern. 2 vehicles involved, minor damage."),
        Incident::new(
            3,
            "Anna Salai",
            "Queue length exceeding threshold",
            today_at(14, 18),
            Priority::Low,
            IncidentDetails::Congestion {
                queue_length: 15,
                suggestion: "Extend NS green by 20s".to_string(),
            },
            &[
                "Extend green phase",
                "Optimize signal timing",
                "Monitor queue length",
            ],
        )
        .with_description("Vehicle queue detected at 15+ vehicles. Suggested timing adjustment."),
    ]
}

fn today_at(hour: u32, minute: u32) -> DateTime<Local> {
    let now = Local::now();
    NaiveTime::from_hms_opt(hour, minute, 0)
        .and_then(|time| now.date_naive().and_time(time).and_local_timezone(Local).single())
        .unwrap_or(now)
}
