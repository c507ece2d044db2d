pub struct Rotation;
pub struct Position;
pub struct ExtrinsicRotation;
pub struct ExtrinsicPosition;
pub struct Velocity;
pub struct GyroBias;
pub struct AccelBias;
pub struct Gravity;
