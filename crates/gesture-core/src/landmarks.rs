//! Typed hand landmarks.
//!
//! Estimators hand back an untyped list of points per hand. [`Hand`] pins that
//! list to the fixed 21-slot layout of the MediaPipe hand model so the thumb
//! and index tips are always present once a `Hand` exists.

use crate::GestureError;

/// Number of landmarks produced per detected hand.
pub const LANDMARK_COUNT: usize = 21;

/// One landmark in image pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Landmark {
    pub id: u8,
    pub x: i32,
    pub y: i32,
}

impl Landmark {
    pub const fn new(id: u8, x: i32, y: i32) -> Self {
        Self { id, x, y }
    }

    /// Convert normalized estimator coordinates (0.0..=1.0) into pixels.
    ///
    /// The fractional part is truncated toward zero.
    pub fn from_normalized(id: u8, nx: f32, ny: f32, width: u32, height: u32) -> Self {
        Self {
            id,
            x: (nx * width as f32) as i32,
            y: (ny * height as f32) as i32,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Landmark slots of the 21-point hand model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Skeleton edges between landmark ids, used when drawing a hand.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// A detected hand with every landmark slot filled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hand {
    points: [Landmark; LANDMARK_COUNT],
}

impl Hand {
    pub fn point(&self, landmark: HandLandmark) -> Landmark {
        self.points[landmark.index()]
    }

    pub fn thumb_tip(&self) -> Landmark {
        self.point(HandLandmark::ThumbTip)
    }

    pub fn index_tip(&self) -> Landmark {
        self.point(HandLandmark::IndexFingerTip)
    }

    pub fn points(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.points
    }
}

impl TryFrom<&[Landmark]> for Hand {
    type Error = GestureError;

    fn try_from(points: &[Landmark]) -> Result<Self, Self::Error> {
        if points.len() != LANDMARK_COUNT {
            return Err(GestureError::InvalidHandShape {
                expected: LANDMARK_COUNT,
                found: points.len(),
            });
        }
        let mut slots = [Landmark::default(); LANDMARK_COUNT];
        for (slot, (index, point)) in slots.iter_mut().zip(points.iter().enumerate()) {
            if usize::from(point.id) != index {
                return Err(GestureError::MisplacedLandmark {
                    index,
                    id: point.id,
                });
            }
            *slot = *point;
        }
        Ok(Self { points: slots })
    }
}

impl TryFrom<Vec<Landmark>> for Hand {
    type Error = GestureError;

    fn try_from(points: Vec<Landmark>) -> Result<Self, Self::Error> {
        Hand::try_from(points.as_slice())
    }
}

#[cfg(test)]
pub(crate) fn hand_with_tips(thumb: (i32, i32), index: (i32, i32)) -> Hand {
    let mut points: Vec<Landmark> = (0..LANDMARK_COUNT as u8)
        .map(|id| Landmark::new(id, 100 + id as i32, 200 + id as i32))
        .collect();
    points[HandLandmark::ThumbTip.index()] = Landmark::new(4, thumb.0, thumb.1);
    points[HandLandmark::IndexFingerTip.index()] = Landmark::new(8, index.0, index.1);
    Hand::try_from(points).expect("fixture hand is well formed")
}
