//! Solidity bindings of the message service contracts.
use alloy::sol;

sol! {
    interface IMessageService {
        event MessageSent(
            address indexed _from,
            address indexed _to,
            uint256 _fee,
            uint256 _value,
            uint256 _nonce,
            bytes _calldata,
            bytes32 indexed _messageHash
        );

        function claimMessage(
            address _from,
            address _to,
            uint256 _fee,
            uint256 _value,
            address _feeRecipient,
            bytes _calldata,
            uint256 _nonce
        ) external;

        function inboxL1L2MessageStatus(bytes32 messageHash) external view returns (uint256 status);
        function inboxL2L1MessageStatus(bytes32 messageHash) external view returns (uint256 status);

        function limitInWei() external view returns (uint256 limit);
        function currentPeriodAmountInWei() external view returns (uint256 amount);

        error MessageDoesNotExistOrHasAlreadyBeenClaimed(bytes32 messageHash);
        error MessageAlreadyClaimed(uint256 messageIndex);
        error MessageSendingFailed(address destination);
        error FeePaymentFailed(address recipient);
        error RateLimitExceeded();
        error ZeroAddressNotAllowed();
        error InvalidMerkleProof();
        error ProofLengthDifferentThanMerkleDepth(uint256 actual, uint256 expected);
        error L2MerkleRootDoesNotExist();
        error IsPaused(uint8 pauseType);
    }
}
